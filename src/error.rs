//! Errors returned by the CSS scoping engine and the HTML rewriter.
//!
//! Every failure is a deterministic function of the input, so nothing here is
//! retried. Callers must discard any output on error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CssModulesError>;

#[derive(Debug, Error)]
pub enum CssModulesError {
    /// Malformed stylesheet structure or unreadable input.
    #[error("cannot convert input to css modules: {reason}")]
    InvalidInput { reason: String },

    /// Selector text outside the class/combinator/pseudo grammar.
    #[error("invalid css modules selector '{selector}'")]
    InvalidSelector { selector: String },

    /// A `css-module` attribute names a class the map does not contain.
    #[error("css modules class '{class}' not found")]
    ClassNotFound { class: String },

    #[error("the output of this parser has already been written")]
    AlreadyWritten,

    #[error("unexpected internal error: {reason}")]
    UnexpectedInternal { reason: String },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl CssModulesError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_selector(selector: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
        }
    }
}
