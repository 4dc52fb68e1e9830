//! CSS Tokenizer
//!
//! Splits a stylesheet into typed tokens that keep their exact source text.
//! Works on raw bytes, so a stylesheet in any ASCII-compatible encoding is
//! accepted. The tokenizer never fails: unterminated comments and strings
//! simply run to the end of input. Concatenating every token's text yields the
//! input again.

use crate::find_bytes;

/// Byte range of a token in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssTokenKind {
    /// `.` introducing a class selector
    Dot,
    Ident,
    Colon,
    /// `@name`, text includes the `@`
    AtKeyword,
    /// `#name`
    Hash,
    Number,
    String,
    LeftBrace,
    RightBrace,
    Semicolon,
    Comment,
    Whitespace,
    /// Any other single byte
    Delim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CssToken<'a> {
    pub kind: CssTokenKind,
    pub text: &'a [u8],
    pub span: Span,
}

impl<'a> CssToken<'a> {
    /// Name of an at-keyword without the leading `@`.
    pub fn at_keyword_name(&self) -> Option<&'a [u8]> {
        match self.kind {
            CssTokenKind::AtKeyword => Some(&self.text[1..]),
            _ => None,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == CssTokenKind::Whitespace
    }
}

pub struct CssLexer<'a> {
    source: &'a [u8],
    pos: usize,
}

impl<'a> CssLexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self { source, pos: 0 }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek_at(0) {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
    }

    /// Consume identifier bytes, including escapes and non-ASCII.
    fn eat_name(&mut self) {
        while let Some(b) = self.peek_at(0) {
            if b == b'\\' && self.peek_at(1).is_some_and(|n| n != b'\n') {
                self.pos += 2;
            } else if is_name_byte(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn starts_name(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            Some(b'-') => match self.peek_at(offset + 1) {
                Some(b'-') => true,
                Some(b'\\') => self.peek_at(offset + 2).is_some_and(|n| n != b'\n'),
                Some(n) => is_name_start_byte(n),
                None => false,
            },
            Some(b'\\') => self.peek_at(offset + 1).is_some_and(|n| n != b'\n'),
            Some(b) => is_name_start_byte(b),
            None => false,
        }
    }

    fn lex_comment(&mut self) {
        self.pos += 2;
        match find_bytes(&self.source[self.pos..], b"*/") {
            Some(idx) => self.pos += idx + 2,
            None => self.pos = self.source.len(),
        }
    }

    fn lex_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek_at(0) {
            match b {
                b'\\' => self.pos = (self.pos + 2).min(self.source.len()),
                b'\n' => return,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn lex_number(&mut self) {
        self.eat_while(|b| b.is_ascii_digit());
        if self.peek_at(0) == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            self.eat_while(|b| b.is_ascii_digit());
        }
    }
}

impl<'a> Iterator for CssLexer<'a> {
    type Item = CssToken<'a>;

    fn next(&mut self) -> Option<CssToken<'a>> {
        let start = self.pos;
        let b = self.peek_at(0)?;

        let kind = match b {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' => {
                self.eat_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c'));
                CssTokenKind::Whitespace
            }
            b'/' if self.peek_at(1) == Some(b'*') => {
                self.lex_comment();
                CssTokenKind::Comment
            }
            b'"' | b'\'' => {
                self.lex_string(b);
                CssTokenKind::String
            }
            b'.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                self.lex_number();
                CssTokenKind::Number
            }
            b'.' => {
                self.pos += 1;
                CssTokenKind::Dot
            }
            b'0'..=b'9' => {
                self.lex_number();
                CssTokenKind::Number
            }
            b':' => {
                self.pos += 1;
                CssTokenKind::Colon
            }
            b'{' => {
                self.pos += 1;
                CssTokenKind::LeftBrace
            }
            b'}' => {
                self.pos += 1;
                CssTokenKind::RightBrace
            }
            b';' => {
                self.pos += 1;
                CssTokenKind::Semicolon
            }
            b'@' if self.starts_name(1) => {
                self.pos += 1;
                self.eat_name();
                CssTokenKind::AtKeyword
            }
            b'#' if self.peek_at(1).is_some_and(|n| is_name_byte(n) || n == b'\\') => {
                self.pos += 1;
                self.eat_name();
                CssTokenKind::Hash
            }
            _ if self.starts_name(0) => {
                self.eat_name();
                CssTokenKind::Ident
            }
            _ => {
                self.pos += 1;
                CssTokenKind::Delim
            }
        };

        Some(CssToken {
            kind,
            text: &self.source[start..self.pos],
            span: Span {
                start,
                end: self.pos,
            },
        })
    }
}

fn is_name_start_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_name_byte(b: u8) -> bool {
    is_name_start_byte(b) || b.is_ascii_digit() || b == b'-'
}
