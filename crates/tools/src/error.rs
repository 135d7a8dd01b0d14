//! Tool-level error type.

use thiserror::Error;

/// Errors returned by the tool registry or the tool invoker.
///
/// No variant implies a retry at the engine layer; retry policy, if any,
/// belongs to the concrete collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The registry does not know this tool identifier.
    #[error("unknown tool '{0}'")]
    NotFound(String),

    /// The tool was reached but refused or failed the call.
    #[error("tool '{tool_id}' rejected the call: {message}")]
    Rejected { tool_id: String, message: String },

    /// Network or I/O failure talking to the collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// The collaborator answered with something we could not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
