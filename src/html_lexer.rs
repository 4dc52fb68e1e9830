//! HTML Tokenizer
//!
//! Splits markup into tags, text, comments and doctypes, keeping the raw
//! source bytes of every token so untouched tokens can be copied
//! byte-for-byte, whatever the document's encoding.
//! Anything that is not recognizable markup (template syntax such as
//! `{{ .Title }}`, a stray `<`, an unterminated tag) is plain text.

use crate::find_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlTokenKind {
    Text,
    StartTag,
    SelfClosingTag,
    EndTag,
    Comment,
    Doctype,
}

/// Attribute as written: name with original casing, value without quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a [u8],
    /// `None` for a bare attribute such as `disabled`
    pub value: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlToken<'a> {
    pub kind: HtmlTokenKind,
    pub raw: &'a [u8],
    /// Tag name for tag tokens, empty otherwise
    pub name: &'a [u8],
    pub attrs: Vec<Attribute<'a>>,
}

impl<'a> HtmlToken<'a> {
    fn plain(kind: HtmlTokenKind, raw: &'a [u8]) -> Self {
        Self {
            kind,
            raw,
            name: &[],
            attrs: Vec::new(),
        }
    }

    pub fn is_start_tag(&self) -> bool {
        matches!(
            self.kind,
            HtmlTokenKind::StartTag | HtmlTokenKind::SelfClosingTag
        )
    }
}

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

pub struct HtmlLexer<'a> {
    source: &'a [u8],
    pos: usize,
    raw_text_element: Option<&'static str>,
}

impl<'a> HtmlLexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            pos: 0,
            raw_text_element: None,
        }
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.source.get(at).copied()
    }

    fn take(&mut self, kind: HtmlTokenKind, end: usize) -> HtmlToken<'a> {
        let source = self.source;
        let raw = &source[self.pos..end];
        self.pos = end;
        HtmlToken::plain(kind, raw)
    }

    /// Does a markup construct start at `at`?
    fn starts_markup(&self, at: usize) -> bool {
        self.byte(at) == Some(b'<')
            && matches!(self.byte(at + 1), Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
    }

    fn find_from(&self, at: usize, needle: &[u8]) -> Option<usize> {
        find_bytes(&self.source[at..], needle).map(|idx| at + idx)
    }

    fn lex_text(&mut self) -> HtmlToken<'a> {
        let mut end = self.pos + 1;
        while end < self.source.len() && !self.starts_markup(end) {
            end += 1;
        }
        self.take(HtmlTokenKind::Text, end)
    }

    fn lex_raw_text(&mut self, element: &str) -> Option<HtmlToken<'a>> {
        let bytes = self.source;
        let mut end = self.source.len();
        let mut at = self.pos;
        while let Some(idx) = self.find_from(at, b"</") {
            let name_end = idx + 2 + element.len();
            let matches_name = bytes
                .get(idx + 2..name_end)
                .is_some_and(|name| name.eq_ignore_ascii_case(element.as_bytes()));
            let terminated = !matches!(bytes.get(name_end), Some(b) if b.is_ascii_alphanumeric());
            if matches_name && terminated {
                end = idx;
                break;
            }
            at = idx + 2;
        }
        if end == self.pos {
            return None;
        }
        Some(self.take(HtmlTokenKind::Text, end))
    }

    fn lex_until_gt(&mut self, kind: HtmlTokenKind) -> HtmlToken<'a> {
        match self.find_from(self.pos, b">") {
            Some(idx) => self.take(kind, idx + 1),
            None => self.take(HtmlTokenKind::Text, self.source.len()),
        }
    }

    fn lex_comment(&mut self) -> HtmlToken<'a> {
        let rest = &self.source[self.pos..];
        // `<!-->` and `<!--->` are complete, empty comments
        let end = if rest.starts_with(b"<!-->") {
            self.pos + 5
        } else if rest.starts_with(b"<!--->") {
            self.pos + 6
        } else {
            self.find_from(self.pos + 4, b"-->")
                .map_or(self.source.len(), |idx| idx + 3)
        };
        self.take(HtmlTokenKind::Comment, end)
    }

    /// Start or self-closing tag. `None` when the tag never terminates.
    fn lex_start_tag(&mut self) -> Option<HtmlToken<'a>> {
        let source = self.source;
        let is_space = |b: u8| b.is_ascii_whitespace();
        let mut i = self.pos + 1;
        while matches!(self.byte(i), Some(b) if !is_space(b) && b != b'/' && b != b'>') {
            i += 1;
        }
        let name = &source[self.pos + 1..i];
        let mut attrs = Vec::new();

        let kind = loop {
            while matches!(self.byte(i), Some(b) if is_space(b)) {
                i += 1;
            }
            match self.byte(i)? {
                b'>' => {
                    i += 1;
                    break HtmlTokenKind::StartTag;
                }
                b'/' if self.byte(i + 1) == Some(b'>') => {
                    i += 2;
                    break HtmlTokenKind::SelfClosingTag;
                }
                b'/' => i += 1,
                _ => {
                    let name_start = i;
                    i += 1;
                    while matches!(self.byte(i), Some(b) if !is_space(b) && !matches!(b, b'/' | b'>' | b'=')) {
                        i += 1;
                    }
                    let attr_name = &source[name_start..i];

                    let mut j = i;
                    while matches!(self.byte(j), Some(b) if is_space(b)) {
                        j += 1;
                    }
                    let mut value = None;
                    if self.byte(j) == Some(b'=') {
                        j += 1;
                        while matches!(self.byte(j), Some(b) if is_space(b)) {
                            j += 1;
                        }
                        match self.byte(j)? {
                            quote @ (b'"' | b'\'') => {
                                let close =
                                    source[j + 1..].iter().position(|&b| b == quote)? + j + 1;
                                value = Some(&source[j + 1..close]);
                                i = close + 1;
                            }
                            _ => {
                                let value_start = j;
                                while matches!(self.byte(j), Some(b) if !is_space(b) && b != b'>') {
                                    j += 1;
                                }
                                value = Some(&source[value_start..j]);
                                i = j;
                            }
                        }
                    }
                    attrs.push(Attribute {
                        name: attr_name,
                        value,
                    });
                }
            }
        };

        if kind == HtmlTokenKind::StartTag {
            self.raw_text_element = RAW_TEXT_ELEMENTS
                .iter()
                .copied()
                .find(|el| el.as_bytes().eq_ignore_ascii_case(name));
        }

        let raw = &source[self.pos..i];
        self.pos = i;
        Some(HtmlToken {
            kind,
            raw,
            name,
            attrs,
        })
    }
}

impl<'a> Iterator for HtmlLexer<'a> {
    type Item = HtmlToken<'a>;

    fn next(&mut self) -> Option<HtmlToken<'a>> {
        if let Some(element) = self.raw_text_element.take() {
            if let Some(text) = self.lex_raw_text(element) {
                return Some(text);
            }
        }
        if self.pos >= self.source.len() {
            return None;
        }
        if !self.starts_markup(self.pos) {
            return Some(self.lex_text());
        }

        let source = self.source;
        let rest = &source[self.pos..];
        let token = if rest.starts_with(b"<!--") {
            self.lex_comment()
        } else if rest.starts_with(b"<!") {
            self.lex_until_gt(HtmlTokenKind::Doctype)
        } else if rest.starts_with(b"<?") {
            self.lex_until_gt(HtmlTokenKind::Comment)
        } else if rest.starts_with(b"</") {
            if matches!(self.byte(self.pos + 2), Some(b) if b.is_ascii_alphabetic()) {
                let mut token = self.lex_until_gt(HtmlTokenKind::EndTag);
                if token.kind == HtmlTokenKind::EndTag {
                    token.name = token.raw[2..token.raw.len() - 1].trim_ascii();
                }
                token
            } else {
                self.lex_text()
            }
        } else {
            match self.lex_start_tag() {
                Some(token) => token,
                None => self.take(HtmlTokenKind::Text, self.source.len()),
            }
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(html: &str) -> Vec<(HtmlTokenKind, String)> {
        HtmlLexer::new(html.as_bytes())
            .map(|t| (t.kind, String::from_utf8_lossy(t.raw).into_owned()))
            .collect()
    }

    fn expect(tokens: &[(HtmlTokenKind, &str)]) -> Vec<(HtmlTokenKind, String)> {
        tokens.iter().map(|(k, raw)| (*k, raw.to_string())).collect()
    }

    fn attr<'a>(name: &'a str, value: Option<&'a str>) -> Attribute<'a> {
        Attribute {
            name: name.as_bytes(),
            value: value.map(str::as_bytes),
        }
    }

    #[test]
    fn test_basic_document() {
        use HtmlTokenKind::*;
        assert_eq!(
            kinds("<!DOCTYPE html><div id=\"a\">Hi<!-- c --></div>"),
            expect(&[
                (Doctype, "<!DOCTYPE html>"),
                (StartTag, "<div id=\"a\">"),
                (Text, "Hi"),
                (Comment, "<!-- c -->"),
                (EndTag, "</div>"),
            ])
        );
    }

    #[test]
    fn test_attributes() {
        let token = HtmlLexer::new(br#"<input type=text Disabled value='a "b"' data-x = "1"/>"#)
            .next()
            .unwrap();
        assert_eq!(token.kind, HtmlTokenKind::SelfClosingTag);
        assert_eq!(token.name, b"input");
        assert_eq!(
            token.attrs,
            vec![
                attr("type", Some("text")),
                attr("Disabled", None),
                attr("value", Some(r#"a "b""#)),
                attr("data-x", Some("1")),
            ]
        );
    }

    #[test]
    fn test_template_syntax_is_text() {
        use HtmlTokenKind::*;
        assert_eq!(
            kinds("{{template \"nav\" .x}}\n<p>{{ if a < b }}</p>"),
            expect(&[
                (Text, "{{template \"nav\" .x}}\n"),
                (StartTag, "<p>"),
                (Text, "{{ if a < b }}"),
                (EndTag, "</p>"),
            ])
        );
    }

    #[test]
    fn test_raw_text_elements() {
        use HtmlTokenKind::*;
        assert_eq!(
            kinds("<script>if (a<b) { x('<div css-module=\"a\">') }</script><p>"),
            expect(&[
                (StartTag, "<script>"),
                (Text, "if (a<b) { x('<div css-module=\"a\">') }"),
                (EndTag, "</script>"),
                (StartTag, "<p>"),
            ])
        );
        assert_eq!(
            kinds("<style></style>"),
            expect(&[(StartTag, "<style>"), (EndTag, "</style>")])
        );
    }

    #[test]
    fn test_abrupt_empty_comments_close_immediately() {
        use HtmlTokenKind::*;
        assert_eq!(
            kinds("<!--><p class=\"a\"><!---><i>-->"),
            expect(&[
                (Comment, "<!-->"),
                (StartTag, "<p class=\"a\">"),
                (Comment, "<!--->"),
                (StartTag, "<i>"),
                (Text, "-->"),
            ])
        );
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        use HtmlTokenKind::*;
        assert_eq!(
            kinds("a <div class=\"x"),
            expect(&[(Text, "a "), (Text, "<div class=\"x")])
        );
    }

    #[test]
    fn test_non_utf8_text_is_kept() {
        let html: &[u8] = b"<p title=caf\xe9>caf\xe9</p>";
        let tokens: Vec<_> = HtmlLexer::new(html).collect();
        assert_eq!(tokens[0].attrs[0].value, Some(&b"caf\xe9"[..]));
        assert_eq!(tokens[1].raw, b"caf\xe9");
        let rebuilt: Vec<u8> = tokens.iter().flat_map(|t| t.raw.iter().copied()).collect();
        assert_eq!(rebuilt, html);
    }

    #[test]
    fn test_tokens_reassemble_source() {
        let html = "<!doctype html>\n<ul>\n  <li class='a'>é</li>\n</ul><br/><?xml x?>";
        let rebuilt: Vec<u8> = HtmlLexer::new(html.as_bytes())
            .flat_map(|t| t.raw.iter().copied())
            .collect();
        assert_eq!(rebuilt, html.as_bytes());
    }
}
