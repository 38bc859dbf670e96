//! Errors raised into the running program.
//!
//! Instruction handlers return `anyhow::Result`. An error of type
//! [`RuntimeError`] is not an engine fault: the dispatcher converts it into a
//! language-level throw whose value is the error message, so programs can catch
//! it. Any other error aborts the run.

use anyhow::Result;

/// A recoverable failure detected while executing an instruction, such as an
/// integer overflow or an out-of-bounds index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Raises a [`RuntimeError`] with the given message.
pub fn raise<T>(message: impl Into<String>) -> Result<T> {
    Err(RuntimeError::new(message).into())
}
