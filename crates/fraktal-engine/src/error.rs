use std::fmt;

use fraktal_kernel::{CompileError, LinkError};

/// Errors of the runtime API.
#[derive(Debug)]
pub enum Error {
    /// Shared mode is on and no context is current.
    NoContext,
    /// The context a resource belongs to was destroyed.
    ContextDestroyed,
    /// A resource was used while a different context is current.
    ForeignResource { what: &'static str },
    /// Adapter or device acquisition failed.
    Device(String),
    /// Bad dimensions, channel count or initial data.
    InvalidArray(String),
    ArrayDestroyed,
    /// A CPU buffer does not match the array's byte size.
    BufferSize { expected: usize, actual: usize },
    NoActiveKernel,
    KernelDestroyed,
    ReadOnlyTarget,
    TargetCount { expected: usize, actual: usize },
    /// Targets of one run differ in dimensions.
    TargetShape,
    /// An array is bound as an input and passed as a target.
    Aliased { param: String },
    /// The grid needs more workgroups than the device allows.
    GridTooLarge { width: i32, height: i32 },
    Compile(CompileError),
    Link(LinkError),
    Readback(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoContext => f.write_str("no current context (shared mode)"),
            Error::ContextDestroyed => f.write_str("context has been destroyed"),
            Error::ForeignResource { what } => {
                write!(f, "{what} belongs to a different context than the current one")
            }
            Error::Device(msg) => write!(f, "device error: {msg}"),
            Error::InvalidArray(msg) => write!(f, "invalid array: {msg}"),
            Error::ArrayDestroyed => f.write_str("array has been destroyed"),
            Error::BufferSize { expected, actual } => {
                write!(f, "buffer holds {actual} bytes, array needs {expected}")
            }
            Error::NoActiveKernel => f.write_str("no kernel in use"),
            Error::KernelDestroyed => f.write_str("kernel has been destroyed"),
            Error::ReadOnlyTarget => f.write_str("cannot run a kernel into a read-only array"),
            Error::TargetCount { expected, actual } => {
                write!(f, "kernel has {expected} output(s), got {actual} target(s)")
            }
            Error::TargetShape => f.write_str("all targets must have the same dimensions"),
            Error::Aliased { param } => {
                write!(f, "array bound to `{param}` is also a target of this run")
            }
            Error::GridTooLarge { width, height } => {
                write!(f, "grid {width}x{height} exceeds the device dispatch limit")
            }
            Error::Compile(e) => write!(f, "{e}"),
            Error::Link(e) => write!(f, "{e}"),
            Error::Readback(msg) => write!(f, "readback failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Compile(e) => Some(e),
            Error::Link(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}
