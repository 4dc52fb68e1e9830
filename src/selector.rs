//! Selector Validator
//!
//! Validates the text following a class-introducing `.` and splits it into the
//! base class name, an optional combinator and an optional pseudo suffix.
//! Only a small grammar is accepted:
//!
//! ```text
//! name [ws] [combinator] [ws] [ ':' | '::' ] pseudo
//! ```
//!
//! where `combinator` is one of `+`, `>`, `~`, and a bare run of whitespace
//! between the name and the pseudo part is kept as a descendant combinator.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CssModulesError, Result};

lazy_static! {
    static ref CLASS_NAME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
    static ref SCOPED_NAME_RE: Regex = Regex::new(r"^_[a-zA-Z][a-zA-Z0-9_-]*$").unwrap();
}

const COMBINATORS: &[char] = &['+', '>', '~'];

/// A class selector split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSelector {
    /// Class name used as hash input and map key
    pub base: String,
    /// `+`, `>`, `~` or a single space
    pub combinator: Option<String>,
    /// Pseudo-class or pseudo-element, colons included
    pub pseudo: Option<String>,
}

impl ValidatedSelector {
    /// Everything re-emitted after the scoped class name.
    pub fn suffix(&self) -> String {
        let mut suffix = String::new();
        if let Some(combinator) = &self.combinator {
            suffix.push_str(combinator);
        }
        if let Some(pseudo) = &self.pseudo {
            suffix.push_str(pseudo);
        }
        suffix
    }
}

pub fn is_valid_class_name(name: &str) -> bool {
    CLASS_NAME_RE.is_match(name)
}

/// Scoped names are a class name behind a leading underscore.
pub fn is_valid_scoped_name(name: &str) -> bool {
    SCOPED_NAME_RE.is_match(name)
}

/// Validate the raw selector fragment between `.` and `{`.
pub fn validate(fragment: &str) -> Result<ValidatedSelector> {
    let invalid = || CssModulesError::invalid_selector(fragment.trim());
    let selector = fragment.trim_end();

    let Some((before, after)) = selector.split_once(':') else {
        if !is_valid_class_name(selector) {
            return Err(invalid());
        }
        return Ok(ValidatedSelector {
            base: selector.to_string(),
            combinator: None,
            pseudo: None,
        });
    };

    let mut found = before.match_indices(COMBINATORS);
    let combinator = match (found.next(), found.next()) {
        (None, _) => {
            // Whitespace between the class and the pseudo part is a descendant
            // combinator.
            if before.len() != before.trim_end().len() {
                Some(" ".to_string())
            } else {
                None
            }
        }
        (Some((_, c)), None) => Some(c.to_string()),
        (Some(_), Some(_)) => return Err(invalid()),
    };

    let base = before.replace(COMBINATORS, "");
    let base = base.trim();
    if !is_valid_class_name(base) {
        return Err(invalid());
    }

    let (colons, name) = match after.strip_prefix(':') {
        Some(rest) => ("::", rest),
        None => (":", after),
    };
    if name.contains(':') {
        return Err(invalid());
    }
    let name = name.trim();
    if !is_valid_class_name(name) {
        return Err(invalid());
    }

    Ok(ValidatedSelector {
        base: base.to_string(),
        combinator,
        pseudo: Some(format!("{}{}", colons, name)),
    })
}
