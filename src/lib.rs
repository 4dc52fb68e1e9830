//! # CSS Modules for server-rendered pages
//!
//! Two engines that share one [`ClassNameMap`]:
//!
//! 1. **CSS Scoping Engine** ([`CssScopingEngine`]): rewrites every class
//!    selector of a stylesheet to `_<name>_<hash>` and records the mapping.
//!    `:global { ... }` blocks are emitted unwrapped and unscoped, and
//!    `@keyframes` / `@font-face` blocks are copied untouched.
//!
//! 2. **HTML Attribute Rewriter** ([`HtmlRewriter`]): replaces each
//!    `css-module="a b"` attribute with the scoped names from the mapping,
//!    appended to the element's `class` attribute.
//!
//! Each stylesheet invocation draws its own salt, so the same class name gets
//! a different scoped name in every invocation unless a fixed salt is passed
//! through [`CssModulesOptions`].

use rayon::prelude::*;
use std::io::Read;

mod css_lexer;
mod css_modules;
mod error;
mod html_lexer;
mod html_rewriter;
mod options;
mod scoper;
mod selector;
mod sink;

#[cfg(feature = "napi")]
mod bindings;


#[cfg(feature = "napi")]
pub use bindings::{process_css_modules_native, process_html_native};

pub use css_lexer::{CssLexer, CssToken, CssTokenKind, Span};
pub use css_modules::{CssModulesOutput, CssScopingEngine};
pub use error::{CssModulesError, Result};
pub use html_lexer::{Attribute, HtmlLexer, HtmlToken, HtmlTokenKind};
pub use html_rewriter::{escape_attribute_value, HtmlCssModulesParser, HtmlRewriter, CSS_MODULE_ATTR};
pub use options::{CssModulesOptions, ScopingContext};
pub use scoper::{
    compute_hash, scoped_name, ClassNameMap, ClassScoper, Salt, DEFAULT_HASH_LENGTH,
    MAX_HASH_LENGTH, MIN_HASH_LENGTH,
};
pub use selector::{is_valid_class_name, is_valid_scoped_name, ValidatedSelector};
pub use sink::OutputSink;

/// Read a whole source into memory. Bytes are taken as-is, any encoding.
pub(crate) fn read_source<R: Read>(mut reader: R, what: &str) -> Result<Vec<u8>> {
    let mut source = Vec::new();
    reader
        .read_to_end(&mut source)
        .map_err(|e| CssModulesError::invalid_input(format!("cannot read {}: {}", what, e)))?;
    Ok(source)
}

/// Offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scope a stylesheet with a fresh random salt.
pub fn process_css_modules<R: Read>(css: R) -> Result<CssModulesOutput> {
    process_css_modules_with_options(css, &CssModulesOptions::default())
}

pub fn process_css_modules_with_options<R: Read>(
    css: R,
    options: &CssModulesOptions,
) -> Result<CssModulesOutput> {
    let ctx = ScopingContext::from_options(options)?;
    let source = read_source(css, "css")?;
    CssScopingEngine::new(ctx).process(&source)
}

/// Rewrite `css-module` attributes of an HTML document.
pub fn process_html_with_css_modules<R: Read>(html: R, classes: &ClassNameMap) -> Result<Vec<u8>> {
    let source = read_source(html, "html")?;
    HtmlRewriter::new(classes).rewrite(&source)
}

/// Scope independent stylesheets in parallel, each with its own salt.
///
/// Results come back in input order.
pub fn scope_stylesheets<S: AsRef<[u8]> + Sync>(sheets: &[S]) -> Vec<Result<CssModulesOutput>> {
    tracing::debug!(count = sheets.len(), "scoping stylesheets");
    sheets
        .par_iter()
        .map(|css| CssScopingEngine::new(ScopingContext::generate()).process(css))
        .collect()
}
