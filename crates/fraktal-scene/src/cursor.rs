//! Parser state for scene directives.
//!
//! [`Cursor`] is the whole state of a parse: the text and a byte position.
//! Every parse function takes it by `&mut` and returns a `Result`, so an
//! error aborts the directive without any shared flags.

use crate::error::SceneError;
use crate::params::{Angle2, Float2, Float3, Int2};

#[derive(Debug, Clone)]
pub(crate) struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    /// Moves past one character.
    pub(crate) fn bump(&mut self) {
        if let Some(ch) = self.rest().chars().next() {
            self.pos += ch.len_utf8();
        }
    }

    pub(crate) fn error(&self, msg: impl Into<String>) -> SceneError {
        let before = &self.src[..self.pos];
        let line = before.matches('\n').count() + 1;
        let col = before.rfind('\n').map_or(before.len(), |i| before.len() - i - 1) + 1;
        SceneError::new(msg, line, col)
    }

    // ── Lexical helpers ───────────────────────────────────────────────────

    pub(crate) fn skip_alpha(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
    }

    pub(crate) fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Skips one `//` or `/* */` comment if the cursor is on one.
    pub(crate) fn skip_comment(&mut self) {
        if self.rest().starts_with("//") {
            while !matches!(self.peek(), None | Some(b'\n' | b'\r')) {
                self.bump();
            }
            while matches!(self.peek(), Some(b'\n' | b'\r')) {
                self.pos += 1;
            }
        } else if self.rest().starts_with("/*") {
            self.pos += 2;
            match self.rest().find("*/") {
                Some(end) => self.pos += end + 2,
                None => self.pos = self.src.len(),
            }
        }
    }

    pub(crate) fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Like [`Cursor::eat`] but allows blanks before `c`.
    fn eat_after_blank(&mut self, c: u8) -> bool {
        let save = self.pos;
        self.skip_blank();
        if self.eat(c) {
            true
        } else {
            self.pos = save;
            false
        }
    }

    // ── Scalars ───────────────────────────────────────────────────────────

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// A decimal integer, with leading blanks and sign.
    pub(crate) fn int(&mut self) -> Option<i32> {
        let save = self.pos;
        self.skip_blank();
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        if self.digits() == 0 {
            self.pos = save;
            return None;
        }
        match self.src[start..self.pos].parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    /// A decimal float (`-1`, `.5`, `2.`, `1e-3`), with leading blanks.
    pub(crate) fn float(&mut self) -> Option<f32> {
        let save = self.pos;
        self.skip_blank();
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut n = self.digits();
        if self.eat(b'.') {
            n += self.digits();
        }
        if n == 0 {
            self.pos = save;
            return None;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                self.pos = mark;
            }
        }
        match self.src[start..self.pos].parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    /// A number followed by `deg` or `rad`, returned in degrees.
    pub(crate) fn angle(&mut self) -> Result<f32, SceneError> {
        let Some(v) = self.float() else {
            return Err(self.error("expected an angle"));
        };
        self.skip_blank();
        if self.eat_str("deg") {
            Ok(v)
        } else if self.eat_str("rad") {
            Ok(v.to_degrees())
        } else {
            Err(self.error("angle must have either 'deg' or 'rad' as suffix"))
        }
    }

    // ── Tuples ────────────────────────────────────────────────────────────

    fn tuple<const N: usize, T: Copy + Default>(
        &mut self,
        what: &str,
        mut item: impl FnMut(&mut Self) -> Result<T, SceneError>,
    ) -> Result<[T; N], SceneError> {
        const ORDINALS: [&str; 3] = ["first", "second", "third"];
        let mut out = [T::default(); N];
        if !self.eat_after_blank(b'(') {
            return Err(self.error(format!("{what} must begin with parenthesis")));
        }
        for (i, slot) in out.iter_mut().enumerate() {
            if i > 0 && !self.eat_after_blank(b',') {
                return Err(self.error(format!("{what} components must be separated by ','")));
            }
            *slot = item(self).map_err(|e| {
                SceneError { message: format!("{what}: {} component: {}", ORDINALS[i], e.message), ..e }
            })?;
        }
        if !self.eat_after_blank(b')') {
            return Err(self.error(format!("{what} must end with parenthesis")));
        }
        Ok(out)
    }

    fn number(&mut self) -> Result<f32, SceneError> {
        self.float().ok_or_else(|| self.error("expected a number"))
    }

    pub(crate) fn int2(&mut self) -> Result<Int2, SceneError> {
        let [x, y] = self.tuple::<2, _>("integer tuple", |c| c.int().ok_or_else(|| c.error("expected an integer")))?;
        Ok(Int2 { x, y })
    }

    pub(crate) fn float2(&mut self) -> Result<Float2, SceneError> {
        let [x, y] = self.tuple::<2, _>("tuple", Self::number)?;
        Ok(Float2 { x, y })
    }

    pub(crate) fn float3(&mut self) -> Result<Float3, SceneError> {
        let [x, y, z] = self.tuple::<3, _>("tuple", Self::number)?;
        Ok(Float3 { x, y, z })
    }

    pub(crate) fn angle2(&mut self) -> Result<Angle2, SceneError> {
        let [theta, phi] = self.tuple::<2, _>("angle tuple", Self::angle)?;
        Ok(Angle2 { theta, phi })
    }

    pub(crate) fn scalar(&mut self) -> Result<f32, SceneError> {
        self.number()
    }
}

// ── Argument lists ────────────────────────────────────────────────────────

/// State of a `(name=value, ...)` list being parsed.
#[derive(Debug)]
pub(crate) struct List {
    first: bool,
}

impl List {
    /// Consumes the opening `(`.
    pub(crate) fn begin(c: &mut Cursor<'_>) -> Option<Self> {
        c.eat(b'(').then_some(Self { first: true })
    }

    /// Positions the cursor on the next argument; `Ok(false)` after `)`.
    pub(crate) fn next(&mut self, c: &mut Cursor<'_>) -> Result<bool, SceneError> {
        c.skip_blank();
        if c.eat(b')') {
            return Ok(false);
        }
        if c.peek().is_none() {
            return Err(c.error("missing ')' at end of list"));
        }
        if !self.first && !c.eat(b',') {
            return Err(c.error("list components must be separated by ','"));
        }
        c.skip_blank();
        self.first = false;
        Ok(true)
    }
}

/// Parses `name = value` when the cursor is on `name`.
pub(crate) fn argument<'s, T>(
    c: &mut Cursor<'s>,
    name: &str,
    value: impl FnOnce(&mut Cursor<'s>) -> Result<T, SceneError>,
) -> Result<Option<T>, SceneError> {
    if !c.eat_str(name) {
        return Ok(None);
    }
    c.skip_blank();
    if !c.eat(b'=') {
        return Err(c.error(format!("expected '=' between '{name}' and its value")));
    }
    value(c).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars() {
        assert_eq!(Cursor::new(" -42,").int(), Some(-42));
        assert_eq!(Cursor::new("x").int(), None);
        assert_eq!(Cursor::new("2.5e1").float(), Some(25.0));
        assert_eq!(Cursor::new(".5").float(), Some(0.5));
        assert_eq!(Cursor::new("3e").float(), Some(3.0));
        assert_eq!(Cursor::new("-").float(), None);
    }

    #[test]
    fn angles_are_normalized_to_degrees() {
        assert_eq!(Cursor::new("30deg").angle(), Ok(30.0));
        let rad = Cursor::new("3.14159265 rad").angle().unwrap();
        assert!((rad - 180.0).abs() < 1e-3);
        assert!(Cursor::new("30").angle().unwrap_err().message.contains("suffix"));
    }

    #[test]
    fn tuples() {
        assert_eq!(Cursor::new("(320,240)").int2(), Ok(Int2 { x: 320, y: 240 }));
        assert_eq!(Cursor::new("( 1 , 2 , 3 )").float3(), Ok(Float3 { x: 1.0, y: 2.0, z: 3.0 }));
        assert!(Cursor::new("(1,2").float2().unwrap_err().message.contains("end with"));
        assert!(Cursor::new("1,2)").float2().unwrap_err().message.contains("begin with"));
        assert!(Cursor::new("(1;2)").float2().unwrap_err().message.contains("separated"));
        let e = Cursor::new("(1deg,x)").angle2().unwrap_err();
        assert!(e.message.contains("second component"));
    }

    #[test]
    fn error_positions() {
        let mut c = Cursor::new("ab\ncd");
        c.pos = 4;
        let e = c.error("x");
        assert_eq!((e.line, e.col), (2, 2));
    }

    #[test]
    fn list_walk() {
        let mut c = Cursor::new("(a=1, b=2)");
        let mut list = List::begin(&mut c).unwrap();
        let mut seen = Vec::new();
        while list.next(&mut c).unwrap() {
            if let Some(v) = argument(&mut c, "a", Cursor::scalar).unwrap() {
                seen.push(v);
            } else if let Some(v) = argument(&mut c, "b", Cursor::scalar).unwrap() {
                seen.push(v);
            } else {
                panic!("unexpected argument");
            }
        }
        assert_eq!(seen, [1.0, 2.0]);
    }

    #[test]
    fn unterminated_list() {
        let mut c = Cursor::new("(a=1");
        let mut list = List::begin(&mut c).unwrap();
        assert!(list.next(&mut c).unwrap());
        argument(&mut c, "a", Cursor::scalar).unwrap();
        assert!(list.next(&mut c).is_err());
    }
}
