//! Process-wide diagnostic log.
//!
//! Compile and link failures append a human-readable message here (and log it
//! at `error`), so hosts without a logger, such as C callers, can still show
//! what went wrong.

use std::sync::{Mutex, PoisonError};

static LOG: Mutex<String> = Mutex::new(String::new());

/// Appends one message, newline-terminated.
pub fn push(message: impl AsRef<str>) {
    let message = message.as_ref();
    log::error!("{message}");
    let mut log = LOG.lock().unwrap_or_else(PoisonError::into_inner);
    log.push_str(message);
    if !message.ends_with('\n') {
        log.push('\n');
    }
}

/// Everything pushed since the last [`clear`].
pub fn contents() -> String {
    LOG.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn clear() {
    LOG.lock().unwrap_or_else(PoisonError::into_inner).clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_accumulate() {
        push("fraktal diagnostics test: first");
        push("fraktal diagnostics test: second\n");
        let log = contents();
        assert!(log.contains("fraktal diagnostics test: first\n"));
        assert!(log.contains("fraktal diagnostics test: second\n"));
        assert!(!log.contains("second\n\n"));
    }
}
