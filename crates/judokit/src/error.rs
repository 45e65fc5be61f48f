//! Error types for Judokit
//!
//! Only structural problems escape the core as errors. Unknown commands and
//! ambiguous conditions are resolved through the [`Oracle`](crate::Oracle)
//! and never surface here unless the operator explicitly aborts.

use crate::limits::LimitExceeded;
use thiserror::Error;

/// Result type alias using Judokit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Judokit error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Parse error occurred while parsing the script (without location info).
    #[error("parse error: {0}")]
    Parse(String),

    /// Parse error with source location information.
    #[error("parse error at line {line}, column {column}: {message}")]
    ParseAt {
        message: String,
        line: usize,
        column: usize,
    },

    /// The compiler met a node kind it cannot place in the action stack.
    ///
    /// Fatal for the current build; the stack is left as it was before the
    /// failing compile started.
    #[error("invalid node in interpreter: {0}")]
    Structural(String),

    /// Unknown command that the operator refused to skip or run for real.
    #[error("command not implemented: {0}")]
    CommandNotFound(String),

    /// Execution error occurred while running an action.
    #[error("execution error: {0}")]
    Execution(String),

    /// I/O error from the host (script loading, config files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or mistyped snapshot JSON.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Resource limit exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(#[from] LimitExceeded),
}

impl Error {
    /// Create a parse error with source location.
    pub fn parse_at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::ParseAt {
            message: message.into(),
            line,
            column,
        }
    }
}
