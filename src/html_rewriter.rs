//! HTML Attribute Rewriter
//!
//! Replaces the `css-module` attribute of start tags with the scoped class
//! names from a [`ClassNameMap`], merged into the tag's `class` attribute.
//! Every token other than a start tag with attributes is copied verbatim.

use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::io::Read;

use crate::error::{CssModulesError, Result};
use crate::html_lexer::{HtmlLexer, HtmlToken, HtmlTokenKind};
use crate::scoper::ClassNameMap;
use crate::sink::OutputSink;

pub const CSS_MODULE_ATTR: &str = "css-module";
const CLASS_ATTR: &str = "class";

lazy_static! {
    static ref CHAR_REF_RE: Regex =
        Regex::new(r"^&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").unwrap();
}

/// Escape an attribute value for a double-quoted attribute.
///
/// An `&` that already starts a character reference is kept as is.
pub fn escape_attribute_value(value: &[u8], out: &mut Vec<u8>) {
    for (idx, &b) in value.iter().enumerate() {
        match b {
            b'&' if CHAR_REF_RE.is_match(&value[idx..]) => out.push(b'&'),
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' => out.extend_from_slice(b"&gt;"),
            b'"' => out.extend_from_slice(b"&#34;"),
            b'\'' => out.extend_from_slice(b"&#39;"),
            _ => out.push(b),
        }
    }
}

pub struct HtmlRewriter<'m> {
    classes: &'m ClassNameMap,
}

impl<'m> HtmlRewriter<'m> {
    pub fn new(classes: &'m ClassNameMap) -> Self {
        Self { classes }
    }

    /// Rewrite a whole document.
    pub fn rewrite(&self, html: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let html = html.as_ref();
        let mut out = Vec::with_capacity(html.len());
        let mut rewritten = 0usize;

        for token in HtmlLexer::new(html) {
            if token.is_start_tag() && !token.attrs.is_empty() {
                self.rewrite_tag(&token, &mut out)?;
                rewritten += 1;
            } else {
                out.extend_from_slice(token.raw);
            }
        }

        tracing::debug!(
            input_len = html.len(),
            output_len = out.len(),
            tags = rewritten,
            "rewrote html"
        );
        Ok(out)
    }

    /// Rewrite a document into `out`. Nothing is written on error.
    pub fn rewrite_to<W: OutputSink + ?Sized>(&self, html: impl AsRef<[u8]>, out: &mut W) -> Result<()> {
        let rewritten = self.rewrite(html)?;
        out.write_bytes(&rewritten)?;
        Ok(())
    }

    fn rewrite_tag(&self, token: &HtmlToken<'_>, out: &mut Vec<u8>) -> Result<()> {
        out.push(b'<');
        out.extend_from_slice(token.name);

        let mut class: Option<&[u8]> = None;
        let mut css_module: Option<&[u8]> = None;
        for attr in &token.attrs {
            let value = attr.value.unwrap_or_default();
            if attr.name.eq_ignore_ascii_case(CSS_MODULE_ATTR.as_bytes()) {
                css_module = Some(value);
            } else if attr.name.eq_ignore_ascii_case(CLASS_ATTR.as_bytes()) {
                class = Some(value);
            } else {
                out.push(b' ');
                out.extend_from_slice(attr.name);
                out.extend_from_slice(b"=\"");
                escape_attribute_value(value, out);
                out.push(b'"');
            }
        }

        match css_module {
            None => {
                if let Some(class) = class {
                    out.extend_from_slice(b" class=\"");
                    escape_attribute_value(class.trim_ascii(), out);
                    out.push(b'"');
                }
            }
            Some(modules) => {
                let value = self.merge_classes(class, modules)?;
                out.extend_from_slice(b" class=\"");
                out.extend_from_slice(&value);
                out.push(b'"');
            }
        }

        match token.kind {
            HtmlTokenKind::SelfClosingTag => out.extend_from_slice(b"/>"),
            _ => out.push(b'>'),
        }
        Ok(())
    }

    /// Existing classes first, then the scoped names in attribute order.
    fn merge_classes(&self, class: Option<&[u8]>, modules: &[u8]) -> Result<Vec<u8>> {
        let mut value = Vec::new();
        if let Some(class) = class.map(<[u8]>::trim_ascii).filter(|c| !c.is_empty()) {
            escape_attribute_value(class, &mut value);
        }

        // Empty names from stray whitespace are skipped
        let names = modules
            .split(u8::is_ascii_whitespace)
            .filter(|name| !name.is_empty());
        for name in names {
            let name = String::from_utf8_lossy(name);
            let Some(scoped) = self.classes.get(&name) else {
                tracing::warn!(class = %name, "css-module references an unknown class");
                return Err(CssModulesError::ClassNotFound {
                    class: name.into_owned(),
                });
            };
            if !value.is_empty() {
                value.push(b' ');
            }
            escape_attribute_value(scoped.as_bytes(), &mut value);
        }
        Ok(value)
    }
}

/// Rewrites one HTML source, once.
pub struct HtmlCssModulesParser<'m, R> {
    reader: R,
    classes: &'m ClassNameMap,
    already_written: bool,
}

impl<'m, R: Read> HtmlCssModulesParser<'m, R> {
    pub fn new(reader: R, classes: &'m ClassNameMap) -> Self {
        Self {
            reader,
            classes,
            already_written: false,
        }
    }

    /// Read the whole source and write the rewritten document to `out`.
    ///
    /// The reader is consumed by the first call; later calls fail with
    /// [`CssModulesError::AlreadyWritten`].
    pub fn parse_to<W: OutputSink + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        if self.already_written {
            return Err(CssModulesError::AlreadyWritten);
        }
        self.already_written = true;

        let html = crate::read_source(&mut self.reader, "html")?;
        HtmlRewriter::new(self.classes).rewrite_to(&html, out)
    }
}
