use std::fmt;

/// A diagnostic raised while compiling one kernel fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    /// Fragment origin: the name given to the link, the file path, or
    /// `<fragment N>`.
    pub origin: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(origin: &str, line: usize, col: usize, msg: impl Into<String>) -> Self {
        Self { origin: origin.to_owned(), line, col, message: msg.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.origin, self.line, self.col, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Why a set of fragments could not be linked into a kernel program.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The link had no fragments.
    Empty,
    /// At least one fragment failed to compile when it was added.
    FragmentFailed,
    /// No fragment defines `fn main`.
    MissingMain,
    /// More than one fragment defines `fn main`.
    DuplicateMain { first: String, second: String },
    /// A parameter or output name is declared by two fragments.
    DuplicateName { name: String, first: String, second: String },
    /// Outputs plus arrays exceed the storage bindings a stage may use.
    TooManyBindings { count: usize, max: usize },
    /// naga rejected the combined program.
    Backend { origin: String, line: usize, col: usize, message: String },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "cannot link a kernel with no fragments"),
            Self::FragmentFailed => {
                write!(f, "cannot link a kernel: a fragment failed to compile")
            }
            Self::MissingMain => write!(f, "no fragment defines `fn main`"),
            Self::DuplicateMain { first, second } => {
                write!(f, "`fn main` defined in both {first} and {second}")
            }
            Self::DuplicateName { name, first, second } => {
                write!(f, "`{name}` declared in both {first} and {second}")
            }
            Self::TooManyBindings { count, max } => write!(
                f,
                "kernel uses {count} storage bindings (outputs + arrays), at most {max} are supported"
            ),
            Self::Backend { origin, line, col, message } => {
                write!(f, "{origin}:{line}:{col}: {message}")
            }
        }
    }
}

impl std::error::Error for LinkError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display() {
        let e = CompileError::new("render.f", 3, 7, "unknown directive `#foo`");
        assert_eq!(e.to_string(), "render.f:3:7: unknown directive `#foo`");
    }

    #[test]
    fn backend_error_display() {
        let e = LinkError::Backend {
            origin: "model.f".into(),
            line: 12,
            col: 4,
            message: "no definition in scope for identifier: `q`".into(),
        };
        assert!(e.to_string().starts_with("model.f:12:4: "));
    }
}
