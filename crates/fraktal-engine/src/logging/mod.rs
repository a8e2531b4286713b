//! Logging setup.
//!
//! Everything in fraktal logs through the `log` facade; this module only
//! installs `env_logger` as the backend for binaries and C hosts.

mod init;

pub use init::{LoggingConfig, init_logging};
