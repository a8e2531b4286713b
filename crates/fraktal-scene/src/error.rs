use std::fmt;

/// A scene directive that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneError {
    pub message: String,
    /// 1-based source line number where parsing stopped.
    pub line: usize,
    /// 1-based source column number where parsing stopped.
    pub col: usize,
}

impl SceneError {
    pub(crate) fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { message: msg.into(), line, col }
    }

    /// Prefixes the message with the directive being parsed.
    pub(crate) fn within(mut self, directive: &str) -> Self {
        self.message = format!("error parsing {directive} directive: {}", self.message);
        self
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene error at {}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for SceneError {}
