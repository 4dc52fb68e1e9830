//! # CSS Scoping Engine
//!
//! Single-pass transducer over the CSS token stream. Every token is copied to
//! the output untouched, except at three dispatch points:
//!
//! 1. **Class rules**: `.name[suffix] { body }` is rewritten to
//!    `.<scoped>[suffix] { body }` and the mapping is recorded.
//! 2. **Global blocks**: `:global { ... }` loses its wrapper; the contents are
//!    copied verbatim and never scoped.
//! 3. **At-rules**: `@media` keeps its wrapper but the rules inside it are
//!    scoped like top-level rules. Every other at-rule passes through
//!    verbatim, nested classes included.
//!
//! ## Invariants
//!
//! - Output order follows input order; at most one token of lookahead.
//! - At top level only class selectors may start a rule. Inside `@media`,
//!   rules starting with anything else are copied verbatim.
//! - Input and output are bytes; only ASCII tokens are ever interpreted.
//! - Output is assembled in a scratch buffer owned by the invocation and only
//!   handed to the caller on success.

use std::borrow::Cow;
use std::iter::Peekable;
use std::mem;

use crate::css_lexer::{CssLexer, CssToken, CssTokenKind};
use crate::error::{CssModulesError, Result};
use crate::options::ScopingContext;
use crate::scoper::{ClassNameMap, ClassScoper};
use crate::selector;
use crate::sink::OutputSink;

/// Rewritten stylesheet together with the class map it produced.
#[derive(Debug, Clone)]
pub struct CssModulesOutput {
    pub css: Vec<u8>,
    pub classes: ClassNameMap,
}

impl CssModulesOutput {
    /// The stylesheet as text, invalid UTF-8 replaced.
    pub fn css_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.css)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CssScopingEngine {
    ctx: ScopingContext,
}

impl CssScopingEngine {
    pub fn new(ctx: ScopingContext) -> Self {
        Self { ctx }
    }

    /// Scope a whole stylesheet.
    pub fn process(&self, css: impl AsRef<[u8]>) -> Result<CssModulesOutput> {
        let css = css.as_ref();
        if css.trim_ascii().is_empty() {
            return Err(CssModulesError::invalid_input("stylesheet is empty"));
        }

        let (out, classes) = Transducer::new(css, &self.ctx).run()?;
        if out.is_empty() {
            return Err(CssModulesError::invalid_input(
                "stylesheet produced no output",
            ));
        }

        tracing::debug!(
            input_len = css.len(),
            output_len = out.len(),
            classes = classes.len(),
            "scoped stylesheet"
        );
        Ok(CssModulesOutput { css: out, classes })
    }

    /// Scope a stylesheet and write the result to `out`.
    ///
    /// Nothing is written when an error is returned.
    pub fn process_to<W: OutputSink + ?Sized>(
        &self,
        css: impl AsRef<[u8]>,
        out: &mut W,
    ) -> Result<ClassNameMap> {
        let output = self.process(css)?;
        out.write_bytes(&output.css)?;
        Ok(output.classes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum ScanState {
    #[default]
    Scanning,
    /// Inside `:global { }`; depth counts the open braces, wrapper included
    InGlobalBlock { depth: usize },
    /// Inside an at-rule; depth 0 is the prelude before its block
    InAtRuleBlock { name: String, depth: usize },
}

struct Transducer<'a, 'c> {
    tokens: Peekable<CssLexer<'a>>,
    scoper: ClassScoper<'c>,
    out: Vec<u8>,
    state: ScanState,
    /// States to resume when the current block closes
    enclosing: Vec<ScanState>,
    /// Whitespace inside a global block, held until it is known not to be the
    /// block's trailing whitespace
    pending_ws: Option<&'a [u8]>,
}

impl<'a, 'c> Transducer<'a, 'c> {
    fn new(css: &'a [u8], ctx: &'c ScopingContext) -> Self {
        Self {
            tokens: CssLexer::new(css).peekable(),
            scoper: ClassScoper::new(&ctx.salt, ctx.hash_length),
            out: Vec::with_capacity(css.len() + css.len() / 4),
            state: ScanState::Scanning,
            enclosing: Vec::new(),
            pending_ws: None,
        }
    }

    fn run(mut self) -> Result<(Vec<u8>, ClassNameMap)> {
        while let Some(token) = self.tokens.next() {
            self.step(token)?;
        }
        self.finish()?;
        Ok((self.out, self.scoper.into_classes()))
    }

    fn step(&mut self, token: CssToken<'a>) -> Result<()> {
        match mem::take(&mut self.state) {
            ScanState::Scanning => self.statement(token, ScanState::Scanning),
            ScanState::InGlobalBlock { depth } => {
                self.global_block(token, depth);
                Ok(())
            }
            ScanState::InAtRuleBlock { name, depth } => self.at_rule_block(token, name, depth),
        }
    }

    fn enter(&mut self, current: ScanState, next: ScanState) {
        tracing::trace!(state = ?next, "entering block");
        self.enclosing.push(current);
        self.state = next;
    }

    fn leave(&mut self) {
        self.state = self.enclosing.pop().unwrap_or_default();
        tracing::trace!(state = ?self.state, "leaving block");
    }

    fn finish(&mut self) -> Result<()> {
        loop {
            let unclosed = match &self.state {
                ScanState::Scanning => return Ok(()),
                // An at-rule prelude may run into the end of input
                ScanState::InAtRuleBlock { depth: 0, .. } => None,
                ScanState::InAtRuleBlock { name, .. } => Some(format!("@{}", name)),
                ScanState::InGlobalBlock { .. } => Some(":global".to_string()),
            };
            match unclosed {
                Some(block) => {
                    return Err(CssModulesError::invalid_input(format!(
                        "unbalanced braces: {} block is never closed",
                        block
                    )));
                }
                None => self.leave(),
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Statement level (top level, or directly inside @media)
    // ───────────────────────────────────────────────────────────────────────────

    fn statement(&mut self, token: CssToken<'a>, current: ScanState) -> Result<()> {
        let in_media = matches!(current, ScanState::InAtRuleBlock { .. });
        match token.kind {
            CssTokenKind::Dot => {
                self.class_rule()?;
                self.state = current;
            }
            CssTokenKind::Colon if !in_media || self.at_global_keyword() => {
                self.open_global_block()?;
                self.enter(current, ScanState::InGlobalBlock { depth: 1 });
            }
            CssTokenKind::AtKeyword => {
                self.out.extend_from_slice(token.text);
                let name = String::from_utf8_lossy(token.at_keyword_name().unwrap_or_default())
                    .to_ascii_lowercase();
                self.enter(current, ScanState::InAtRuleBlock { name, depth: 0 });
            }
            CssTokenKind::RightBrace => match current {
                ScanState::InAtRuleBlock { .. } => {
                    self.out.push(b'}');
                    self.leave();
                }
                _ => return Err(CssModulesError::invalid_input("unmatched '}'")),
            },
            CssTokenKind::Whitespace | CssTokenKind::Comment | CssTokenKind::Semicolon => {
                self.out.extend_from_slice(token.text);
                self.state = current;
            }
            _ if in_media => {
                self.passthrough_rule(token)?;
                self.state = current;
            }
            _ => return Err(self.unscopable_rule(token)),
        }
        Ok(())
    }

    fn at_global_keyword(&mut self) -> bool {
        matches!(self.tokens.peek(), Some(t) if t.kind == CssTokenKind::Ident && t.text == b"global")
    }

    /// Copy a rule that does not start with a class, body included.
    fn passthrough_rule(&mut self, first: CssToken<'a>) -> Result<()> {
        self.out.extend_from_slice(first.text);
        if first.kind == CssTokenKind::LeftBrace {
            return self.copy_rule_body();
        }
        // A stray `}` is left for the enclosing block
        while let Some(t) = self.tokens.next_if(|t| t.kind != CssTokenKind::RightBrace) {
            self.out.extend_from_slice(t.text);
            match t.kind {
                CssTokenKind::LeftBrace => return self.copy_rule_body(),
                CssTokenKind::Semicolon => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    /// `.name[suffix] { body }`, called after the dot.
    fn class_rule(&mut self) -> Result<()> {
        if !matches!(self.tokens.peek(), Some(t) if t.kind == CssTokenKind::Ident) {
            return Err(CssModulesError::invalid_input(
                "expected a class name right after '.'",
            ));
        }

        let mut fragment = Vec::new();
        loop {
            match self.tokens.next() {
                Some(t) if t.kind == CssTokenKind::LeftBrace => break,
                Some(t) if matches!(t.kind, CssTokenKind::Semicolon | CssTokenKind::RightBrace) => {
                    return Err(CssModulesError::invalid_input(format!(
                        "class rule '.{}' has no body",
                        String::from_utf8_lossy(&fragment).trim()
                    )));
                }
                Some(t) => fragment.extend_from_slice(t.text),
                None => {
                    return Err(CssModulesError::invalid_input(format!(
                        "class rule '.{}' has no body",
                        String::from_utf8_lossy(&fragment).trim()
                    )));
                }
            }
        }

        // Non-UTF-8 bytes become U+FFFD, which the class grammar rejects
        let selector = selector::validate(&String::from_utf8_lossy(&fragment))?;
        let scoped = self.scoper.scope(&selector.base);
        tracing::trace!(class = %selector.base, scoped = %scoped, "scoped class");

        self.out.push(b'.');
        self.out.extend_from_slice(scoped.as_bytes());
        self.out.extend_from_slice(selector.suffix().as_bytes());
        self.out.extend_from_slice(b" {");
        self.copy_rule_body()
    }

    /// Copy a declaration block verbatim, up to its matching `}`.
    fn copy_rule_body(&mut self) -> Result<()> {
        let mut depth = 1usize;
        for token in self.tokens.by_ref() {
            self.out.extend_from_slice(token.text);
            match token.kind {
                CssTokenKind::LeftBrace => depth += 1,
                CssTokenKind::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(CssModulesError::invalid_input(
            "unbalanced braces: rule body is never closed",
        ))
    }

    /// `:global {`, called after the colon. Nothing of the wrapper is emitted.
    fn open_global_block(&mut self) -> Result<()> {
        match self.tokens.next() {
            Some(t) if t.kind == CssTokenKind::Ident && t.text == b"global" => {}
            _ => {
                return Err(CssModulesError::invalid_input(
                    "expected 'global' after ':'",
                ))
            }
        }
        self.skip_whitespace();
        match self.tokens.next() {
            Some(t) if t.kind == CssTokenKind::LeftBrace => {}
            _ => {
                return Err(CssModulesError::invalid_input(
                    "expected '{' after ':global'",
                ))
            }
        }
        self.skip_whitespace();
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.tokens.next_if(|t| t.is_whitespace()).is_some() {}
    }

    /// Error for a rule whose selector does not start with a class.
    fn unscopable_rule(&mut self, first: CssToken<'a>) -> CssModulesError {
        let mut selector = first.text.to_vec();
        while let Some(t) = self.tokens.next_if(|t| {
            !matches!(
                t.kind,
                CssTokenKind::LeftBrace | CssTokenKind::RightBrace | CssTokenKind::Semicolon
            )
        }) {
            selector.extend_from_slice(t.text);
        }
        CssModulesError::invalid_selector(String::from_utf8_lossy(&selector).trim())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Blocks
    // ───────────────────────────────────────────────────────────────────────────

    fn global_block(&mut self, token: CssToken<'a>, depth: usize) {
        if token.kind == CssTokenKind::RightBrace && depth == 1 {
            self.pending_ws = None;
            self.leave();
            return;
        }

        if let Some(ws) = self.pending_ws.take() {
            self.out.extend_from_slice(ws);
        }
        let depth = match token.kind {
            CssTokenKind::Whitespace => {
                self.pending_ws = Some(token.text);
                depth
            }
            CssTokenKind::LeftBrace => {
                self.out.push(b'{');
                depth + 1
            }
            CssTokenKind::RightBrace => {
                self.out.push(b'}');
                depth - 1
            }
            _ => {
                self.out.extend_from_slice(token.text);
                depth
            }
        };
        self.state = ScanState::InGlobalBlock { depth };
    }

    fn at_rule_block(&mut self, token: CssToken<'a>, name: String, depth: usize) -> Result<()> {
        if name == "media" && depth == 1 {
            return self.statement(token, ScanState::InAtRuleBlock { name, depth });
        }

        match token.kind {
            CssTokenKind::LeftBrace => {
                self.out.push(b'{');
                self.state = ScanState::InAtRuleBlock {
                    name,
                    depth: depth + 1,
                };
            }
            CssTokenKind::RightBrace if depth == 0 => {
                return Err(CssModulesError::invalid_input(format!(
                    "unexpected '}}' in @{} prelude",
                    name
                )));
            }
            CssTokenKind::RightBrace => {
                self.out.push(b'}');
                if depth == 1 {
                    self.leave();
                } else {
                    self.state = ScanState::InAtRuleBlock {
                        name,
                        depth: depth - 1,
                    };
                }
            }
            CssTokenKind::Semicolon if depth == 0 => {
                self.out.push(b';');
                self.leave();
            }
            _ => {
                self.out.extend_from_slice(token.text);
                self.state = ScanState::InAtRuleBlock { name, depth };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoper::{scoped_name, Salt, DEFAULT_HASH_LENGTH};
    use pretty_assertions::assert_eq;

    fn engine() -> CssScopingEngine {
        CssScopingEngine::new(ScopingContext::new(Salt::new("test-salt")))
    }

    fn scoped(name: &str) -> String {
        scoped_name(name, &Salt::new("test-salt"), DEFAULT_HASH_LENGTH)
    }

    #[test]
    fn test_scopes_top_level_class() {
        let out = engine()
            .process(".test-class {\n    color: red;\n    font-size: large;\n}")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!(
                ".{} {{\n    color: red;\n    font-size: large;\n}}",
                scoped("test-class")
            )
        );
        assert_eq!(out.classes.get("test-class"), Some(scoped("test-class").as_str()));
        assert_eq!(out.classes.len(), 1);
    }

    #[test]
    fn test_selector_whitespace_collapses_to_one_space() {
        let out = engine().process(".a:hover\n\n{x:y}").unwrap();
        assert_eq!(out.css_text(), format!(".{}:hover {{x:y}}", scoped("a")));
    }

    #[test]
    fn test_suffix_is_reemitted() {
        let out = engine().process(".a > :hover {}\n.b::after {}").unwrap();
        assert_eq!(
            out.css_text(),
            format!(".{}>:hover {{}}\n.{}::after {{}}", scoped("a"), scoped("b"))
        );
    }

    #[test]
    fn test_rule_body_is_not_scoped() {
        let out = engine()
            .process(".a { background: url(x.png); margin: .5em; }")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!(".{} {{ background: url(x.png); margin: .5em; }}", scoped("a"))
        );
        assert_eq!(out.classes.len(), 1);
    }

    #[test]
    fn test_global_block_is_unwrapped() {
        let out = engine()
            .process(":global {.test-class { color: red; font-size: large; }}")
            .unwrap();
        assert_eq!(out.css_text(), ".test-class { color: red; font-size: large; }");
        assert!(out.classes.is_empty());
    }

    #[test]
    fn test_global_block_with_nested_braces() {
        let out = engine()
            .process(":global {\n  .x { a: b; }\n  .y { c: d; }\n}\n.z {}")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!(".x {{ a: b; }}\n  .y {{ c: d; }}\n.{} {{}}", scoped("z"))
        );
        assert_eq!(out.classes.len(), 1);
        assert!(!out.classes.contains("x"));
    }

    #[test]
    fn test_global_may_hold_any_selector() {
        let out = engine().process(":global { #app > div { margin: 0 } }").unwrap();
        assert_eq!(out.css_text(), "#app > div { margin: 0 }");
    }

    #[test]
    fn test_media_block_scopes_nested_classes() {
        let css = "@media screen and (min-width: 768px) {\n\t.test-class {\n\t\tcolor: green;\n\t}\n}";
        let out = engine().process(css).unwrap();
        assert_eq!(
            out.css_text(),
            format!(
                "@media screen and (min-width: 768px) {{\n\t.{} {{\n\t\tcolor: green;\n\t}}\n}}",
                scoped("test-class")
            )
        );
        assert!(out.classes.contains("test-class"));
    }

    #[test]
    fn test_media_block_supports_suffixes() {
        let out = engine()
            .process("@media print { .a:hover { x: y } .b ~ :focus { x: y } }")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!(
                "@media print {{ .{}:hover {{ x: y }} .{}~:focus {{ x: y }} }}",
                scoped("a"),
                scoped("b")
            )
        );
    }

    #[test]
    fn test_media_copies_rules_without_class() {
        let css = "@media print { body { margin: 0 } #app > div:hover { a: b } * { c: d } }";
        let out = engine().process(css).unwrap();
        assert_eq!(out.css_text(), css);
        assert!(out.classes.is_empty());
    }

    #[test]
    fn test_media_mixed_rules_scope_only_classes() {
        let out = engine()
            .process("@media x { div { } .a { } :root { --c: 1 } }")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!("@media x {{ div {{ }} .{} {{ }} :root {{ --c: 1 }} }}", scoped("a"))
        );
        assert_eq!(out.classes.len(), 1);
    }

    #[test]
    fn test_media_unclosed_plain_rule_fails() {
        assert!(matches!(
            engine().process("@media x { div { color: red; }"),
            Err(CssModulesError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_non_utf8_bytes_pass_through() {
        let css: &[u8] = b"/* caf\xe9 */\n.a { content: \"\xe9\"; }";
        let out = engine().process(css).unwrap();
        let mut expected = b"/* caf\xe9 */\n.".to_vec();
        expected.extend_from_slice(scoped("a").as_bytes());
        expected.extend_from_slice(b" { content: \"\xe9\"; }");
        assert_eq!(out.css, expected);
    }

    #[test]
    fn test_non_utf8_class_name_is_rejected() {
        assert!(matches!(
            engine().process(&b".caf\xe9 { }"[..]),
            Err(CssModulesError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_global_inside_media() {
        let out = engine()
            .process("@media print { :global { .x { a: b } } .y { a: b } }")
            .unwrap();
        assert_eq!(
            out.css_text(),
            format!("@media print {{ .x {{ a: b }} .{} {{ a: b }} }}", scoped("y"))
        );
    }

    #[test]
    fn test_unrecognized_at_rules_pass_through() {
        let css = "@keyframes spin { 0% { transform: rotate(0deg); } 100% { transform: rotate(360deg); } }";
        let out = engine().process(css).unwrap();
        assert_eq!(out.css_text(), css);
        assert!(out.classes.is_empty());

        let css = "@import url(\"theme.css\");\n@supports (display: grid) { .inner { a: b } }";
        let out = engine().process(css).unwrap();
        assert_eq!(out.css_text(), css);
        assert!(out.classes.is_empty());
    }

    #[test]
    fn test_comments_are_copied() {
        let css = "/* header */\n.a { x: y } /* trailing, never closed";
        let out = engine().process(css).unwrap();
        assert_eq!(
            out.css_text(),
            format!("/* header */\n.{} {{ x: y }} /* trailing, never closed", scoped("a"))
        );
    }

    #[test]
    fn test_last_write_wins_for_repeated_class() {
        let out = engine().process(".a { x: 1 }\n.a:hover { x: 2 }").unwrap();
        assert_eq!(out.classes.len(), 1);
        assert_eq!(
            out.css_text(),
            format!(".{0} {{ x: 1 }}\n.{0}:hover {{ x: 2 }}", scoped("a"))
        );
    }

    #[test]
    fn test_rejects_non_class_rules() {
        assert!(matches!(
            engine().process("#test-class {}"),
            Err(CssModulesError::InvalidSelector { selector }) if selector == "#test-class"
        ));
        assert!(matches!(
            engine().process("div > p { }"),
            Err(CssModulesError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_rejects_space_after_dot() {
        assert!(matches!(
            engine().process(". bad-class { }"),
            Err(CssModulesError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_selector() {
        assert!(matches!(
            engine().process(".a:hover:focus { }"),
            Err(CssModulesError::InvalidSelector { .. })
        ));
        assert!(matches!(
            engine().process(".a, .b { }"),
            Err(CssModulesError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_rejects_unbalanced_braces() {
        for css in [
            ".a { color: red;",
            ":global { .a { x: y }",
            "@media screen { .a { x: y }",
            "@keyframes k { 0% { }",
            ".a { } }",
            ".a;",
        ] {
            assert!(
                matches!(engine().process(css), Err(CssModulesError::InvalidInput { .. })),
                "expected {:?} to fail",
                css
            );
        }
    }

    #[test]
    fn test_rejects_malformed_global() {
        assert!(engine().process(":root { }").is_err());
        assert!(engine().process(":global .a { }").is_err());
        assert!(engine().process(":global").is_err());
    }

    #[test]
    fn test_rejects_degenerate_input() {
        assert!(matches!(
            engine().process(""),
            Err(CssModulesError::InvalidInput { .. })
        ));
        assert!(matches!(
            engine().process(" \n\t "),
            Err(CssModulesError::InvalidInput { .. })
        ));
        assert!(matches!(
            engine().process(":global {}"),
            Err(CssModulesError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_at_rule_prelude_may_end_input() {
        let out = engine().process("@import \"a.css\"").unwrap();
        assert_eq!(out.css_text(), "@import \"a.css\"");
    }

    #[test]
    fn test_process_to_writes_only_on_success() {
        let mut sink: Vec<u8> = Vec::new();
        let classes = engine().process_to(".a {}", &mut sink).unwrap();
        assert_eq!(String::from_utf8(sink).unwrap(), format!(".{} {{}}", scoped("a")));
        assert_eq!(classes.len(), 1);

        let mut sink: Vec<u8> = Vec::new();
        assert!(engine().process_to(".a {} #b {}", &mut sink).is_err());
        assert!(sink.is_empty());
    }
}
