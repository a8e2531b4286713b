use std::collections::HashSet;
use std::ops::Range;

use crate::error::CompileError;

// ── Scan results ──────────────────────────────────────────────────────────

/// A `#name(args)` directive found at the start of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    /// Comma-separated arguments, trimmed. Empty for `#name()`.
    pub args: Vec<String>,
    pub line: usize,
    pub col: usize,
}

/// Everything the compiler needs from one pass over a fragment.
#[derive(Debug, Default)]
pub struct Scan {
    /// The source with every directive overwritten by spaces; line and
    /// column positions are unchanged.
    pub body: String,
    pub directives: Vec<Directive>,
    /// Identifiers referenced outside comments and directives, excluding
    /// member accesses (`v.x`).
    pub identifiers: HashSet<String>,
    /// Positions of every `fn main` definition.
    pub main_defs: Vec<(usize, usize)>,
}

// ── Scanner ───────────────────────────────────────────────────────────────

pub struct Scanner<'s> {
    src: &'s str,
    origin: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    /// Only whitespace seen since the last newline.
    line_start: bool,
    last_significant: Option<char>,
    prev_word: Option<&'s str>,
    blanked: Vec<Range<usize>>,
    scan: Scan,
}

impl<'s> Scanner<'s> {
    pub fn new(src: &'s str, origin: &'s str) -> Self {
        Self {
            src,
            origin,
            pos: 0,
            line: 1,
            col: 1,
            line_start: true,
            last_significant: None,
            prev_word: None,
            blanked: Vec::new(),
            scan: Scan::default(),
        }
    }

    pub fn scan(mut self) -> Result<Scan, CompileError> {
        while let Some(ch) = self.peek() {
            match ch {
                '\n' => {
                    self.advance();
                    self.line_start = true;
                }
                c if c.is_whitespace() => {
                    self.advance();
                }
                '/' if self.rest().starts_with("//") => self.skip_line_comment(),
                '/' if self.rest().starts_with("/*") => self.skip_block_comment()?,
                '#' if self.line_start => self.directive()?,
                '#' => return Err(self.error("directives must appear at the start of a line")),
                c if c.is_ascii_digit() => self.number(),
                c if c.is_alphabetic() || c == '_' => self.word(),
                c => {
                    self.advance();
                    self.significant(c);
                }
            }
        }
        self.scan.body = blank(self.src, &self.blanked);
        Ok(self.scan)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn error(&self, msg: impl Into<String>) -> CompileError {
        CompileError::new(self.origin, self.line, self.col, msg)
    }

    fn significant(&mut self, c: char) {
        self.last_significant = Some(c);
        self.prev_word = None;
        self.line_start = false;
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace() && c != '\n') {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), CompileError> {
        let err = self.error("unterminated block comment");
        self.advance();
        self.advance(); // `/*`
        loop {
            if self.rest().starts_with("*/") {
                self.advance();
                self.advance();
                self.line_start = false;
                return Ok(());
            }
            if self.advance().is_none() {
                return Err(err);
            }
        }
    }

    fn number(&mut self) {
        // Suffixes (`1u`, `2.0f`, `1e5`) belong to the literal.
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '_') {
            self.advance();
        }
        self.significant('0');
    }

    fn word(&mut self) {
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let src = self.src;
        let word = &src[start..self.pos];
        if self.last_significant != Some('.') {
            self.scan.identifiers.insert(word.to_owned());
        }
        if word == "main" && self.prev_word == Some("fn") {
            self.scan.main_defs.push((line, col));
        }
        self.significant('a');
        self.prev_word = Some(word);
    }

    fn directive(&mut self) -> Result<(), CompileError> {
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        self.advance(); // `#`

        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let src = self.src;
        let name = &src[name_start..self.pos];
        if name.is_empty() {
            return Err(CompileError::new(self.origin, line, col, "expected a directive name after `#`"));
        }

        self.skip_inline_space();
        if self.peek() != Some('(') {
            return Err(self.error(format!("expected `(` after `#{name}`")));
        }
        self.advance();

        let args_start = self.pos;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(CompileError::new(
                        self.origin,
                        line,
                        col,
                        format!("missing `)` in `#{name}` directive"),
                    ));
                }
                Some(')') => break,
                _ => {
                    self.advance();
                }
            }
        }
        let inner = &src[args_start..self.pos];
        self.advance(); // `)`

        self.skip_inline_space();
        if self.peek() == Some(';') {
            self.advance();
        }
        let end = self.pos;
        self.skip_inline_space();
        let rest = self.rest();
        if !(rest.is_empty() || rest.starts_with('\n') || rest.starts_with("//") || rest.starts_with("/*")) {
            return Err(self.error(format!("unexpected text after `#{name}(...)`")));
        }

        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|a| a.trim().to_owned()).collect()
        };
        self.scan.directives.push(Directive { name: name.to_owned(), args, line, col });
        self.blanked.push(start..end);
        self.line_start = false;
        Ok(())
    }
}

/// Replaces each range of `src` with spaces, keeping newlines.
fn blank(src: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for r in ranges {
        out.push_str(&src[last..r.start]);
        out.extend(src[r.clone()].chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
        last = r.end;
    }
    out.push_str(&src[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Scan {
        Scanner::new(src, "t").scan().unwrap()
    }

    #[test]
    fn directives_are_blanked_in_place() {
        let src = "#param(float, x)\n  #out(vec4, color);\nfn main() {}\n";
        let s = scan(src);
        assert_eq!(s.directives.len(), 2);
        assert_eq!(s.directives[0].args, vec!["float", "x"]);
        assert_eq!((s.directives[1].line, s.directives[1].col), (2, 3));
        assert_eq!(s.body.len(), src.len());
        assert_eq!(s.body.lines().count(), src.lines().count());
        assert!(!s.body.contains('#'));
        assert!(s.body.contains("fn main() {}"));
    }

    #[test]
    fn comments_hide_directives() {
        let s = scan("// #param(float, x)\n/* #out(float, y) */\nfn main() {}");
        assert!(s.directives.is_empty());
        assert!(!s.identifiers.contains("x"));
    }

    #[test]
    fn member_access_is_not_a_reference() {
        let s = scan("fn main() { let a = v.scale + offset; }");
        assert!(s.identifiers.contains("v"));
        assert!(s.identifiers.contains("offset"));
        assert!(!s.identifiers.contains("scale"));
    }

    #[test]
    fn literal_suffixes_are_not_identifiers() {
        let s = scan("fn main() { let a = 1e5 + 2.0f + 3u; }");
        assert!(!s.identifiers.contains("e5"));
        assert!(!s.identifiers.contains("f"));
        assert!(!s.identifiers.contains("u"));
    }

    #[test]
    fn finds_main() {
        let s = scan("fn helper() {}\nfn main() {}");
        assert_eq!(s.main_defs, vec![(2, 4)]);
        assert!(scan("fn mainly() {} let main = 1;").main_defs.is_empty());
    }

    #[test]
    fn directive_mid_line_is_rejected() {
        let err = Scanner::new("let a = 1; #param(float, x)", "f").scan().unwrap_err();
        assert_eq!((err.line, err.col), (1, 12));
    }

    #[test]
    fn missing_paren() {
        let err = Scanner::new("\n#param(float, x\n", "f").scan().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("missing `)`"));
    }

    #[test]
    fn trailing_text_after_directive() {
        assert!(Scanner::new("#out(float, y) fn", "f").scan().is_err());
        assert!(Scanner::new("#out(float, y) // note", "f").scan().is_ok());
    }

    #[test]
    fn unterminated_block_comment() {
        let err = Scanner::new("fn main() {}\n/* open", "f").scan().unwrap_err();
        assert_eq!(err.line, 2);
    }
}
