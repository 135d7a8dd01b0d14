//! Sandbox error type.

use std::time::Duration;

use thiserror::Error;

/// Failures raised while compiling or running a script.
///
/// Messages only ever carry what the script itself produced (error name,
/// message, line); interpreter internals are never surfaced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The source did not parse. `line` refers to the original snippet.
    #[error("syntax error: {message}")]
    Syntax { message: String, line: Option<u32> },

    /// The script threw (or rejected) while loading or running.
    #[error("{name}: {message}")]
    Runtime { name: String, message: String },

    /// The script ran past its wall-clock budget and was terminated.
    #[error("script exceeded its {limit:?} time limit")]
    Timeout { limit: Duration },

    /// The entry call produced something that is not representable as JSON.
    #[error("script result is not valid JSON: {0}")]
    InvalidResult(String),

    /// The interpreter could not be created or driven.
    #[error("sandbox failure: {0}")]
    Internal(String),
}

impl SandboxError {
    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}
