// SPDX-License-Identifier: Apache-2.0

//! Error kinds and the thread-local error buffer.
//!
//! Entry points either return a `Result` directly, or — for batch
//! operations that want to keep going after a failure — set the
//! thread-local slot via [`set_last_error`] and return a neutral value.
//! Callers that accept a neutral return from such a function must probe
//! [`take_last_error`] before trusting it.

use std::cell::RefCell;
use std::fmt;

/// Closed set of error kinds returned by every fallible operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMem,
    Syntax(String),
    InvalidArgument(String),
    RuntimeError(String),
    NotImplemented(String),
    UnknownIdentifier(String),
    DataCorruption(String),
    IoError(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OutOfMem => write!(f, "out of memory"),
            ErrorKind::Syntax(m) => write!(f, "syntax error: {m}"),
            ErrorKind::InvalidArgument(m) => write!(f, "invalid argument: {m}"),
            ErrorKind::RuntimeError(m) => write!(f, "runtime error: {m}"),
            ErrorKind::NotImplemented(m) => write!(f, "not implemented: {m}"),
            ErrorKind::UnknownIdentifier(m) => write!(f, "unknown identifier: {m}"),
            ErrorKind::DataCorruption(m) => write!(f, "data corruption: {m}"),
            ErrorKind::IoError(m) => write!(f, "io error: {m}"),
        }
    }
}

impl std::error::Error for ErrorKind {}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(e: serde_json::Error) -> Self {
        ErrorKind::Syntax(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ErrorKind>;

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorKind>> = const { RefCell::new(None) };
}

/// Record an error in the calling thread's slot. Overwrites any error
/// that was not yet probed — this is a single-slot buffer, not a queue;
/// batch callers must probe after every neutral return.
pub fn set_last_error(err: ErrorKind) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

/// Take and clear the calling thread's error slot.
pub fn take_last_error() -> Option<ErrorKind> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

/// Peek at the calling thread's error slot without clearing it.
pub fn peek_last_error() -> Option<ErrorKind> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Clear the calling thread's error slot without reading it.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_roundtrip() {
        clear_last_error();
        assert!(peek_last_error().is_none());
        set_last_error(ErrorKind::DataCorruption("bad section".into()));
        assert!(peek_last_error().is_some());
        let e = take_last_error().unwrap();
        assert_eq!(e, ErrorKind::DataCorruption("bad section".into()));
        assert!(take_last_error().is_none());
    }

    #[test]
    fn display_messages_are_distinguishable() {
        let kinds = vec![
            ErrorKind::OutOfMem,
            ErrorKind::Syntax("x".into()),
            ErrorKind::InvalidArgument("x".into()),
            ErrorKind::RuntimeError("x".into()),
            ErrorKind::NotImplemented("x".into()),
            ErrorKind::UnknownIdentifier("x".into()),
            ErrorKind::DataCorruption("x".into()),
            ErrorKind::IoError("x".into()),
        ];
        let rendered: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        let unique: std::collections::HashSet<_> = rendered.iter().collect();
        assert_eq!(unique.len(), rendered.len());
    }
}
