//! Error types for the graph passes and file codecs.
//!
//! Structural invariant violations (double set, dispatch over an absent id)
//! are programmer errors and panic at the point of detection; everything a
//! caller can provoke with bad input is reported through [`Error`].

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Malformed input graph (dangling reference, anonymous forward
    /// declaration, duplicate root entry).
    Input(String),
    /// Malformed or unreadable graph file.
    Format(String),
    /// An underlying I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Input(message) => write!(f, "invalid input: {message}"),
            Error::Format(message) => write!(f, "invalid graph file: {message}"),
            Error::Io(error) => write!(f, "I/O error: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}
