//! Engine-level error types.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use sandbox::SandboxError;
use state::StateError;
use tools::ToolError;

use crate::models::NodeId;

/// A cron expression that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cron expression '{expression}': {reason}")]
pub struct CronError {
    pub expression: String,
    pub reason: String,
}

/// Structural errors from tree mutation. A mutation that fails leaves the
/// workflow exactly as it was.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("node id '{0}' is already used in this workflow")]
    DuplicateId(NodeId),

    #[error("the trigger cannot be used with {operation}")]
    TriggerNotAllowed { operation: &'static str },

    /// The target exists but its shape does not support the operation.
    #[error("node '{node_id}' ({node_type}) {reason}")]
    WrongKind {
        node_id: NodeId,
        node_type: &'static str,
        reason: &'static str,
    },

    #[error("slot '{slot}' of '{node_id}' is already occupied")]
    SlotOccupied { node_id: NodeId, slot: &'static str },

    #[error("removing '{node_id}' would leave {children} children competing for a single slot")]
    WouldOrphan { node_id: NodeId, children: usize },

    #[error("replacement for '{expected}' carries id '{found}'")]
    IdMismatch { expected: NodeId, found: NodeId },

    #[error("cannot turn '{node_id}' from {from} into {to} without dropping its children")]
    ShapeMismatch {
        node_id: NodeId,
        from: &'static str,
        to: &'static str,
    },

    #[error("swapping '{ancestor}' with its descendant '{descendant}' would create a cycle")]
    SelfReference { ancestor: NodeId, descendant: NodeId },

    #[error("tool '{tool_identifier}' could not be described: {source}")]
    ToolLookup {
        tool_identifier: String,
        #[source]
        source: ToolError,
    },

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error("malformed workflow document: {0}")]
    Malformed(String),
}

/// One problem found by the compile pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ValidationFailure {
    #[error("node '{node_id}' references unknown tool '{tool_identifier}'")]
    MissingTool {
        node_id: NodeId,
        tool_identifier: String,
    },

    #[error("node '{node_id}' has a script syntax error: {message}")]
    ScriptSyntax {
        node_id: NodeId,
        message: String,
        line: Option<u32>,
    },

    #[error("node '{node_id}' script could not be checked: {message}")]
    ScriptRejected { node_id: NodeId, message: String },

    #[error("tool registry unavailable: {message}")]
    RegistryUnavailable { message: String },
}

/// Errors that abort a workflow run. Every variant names the node that was
/// executing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node '{node_id}' tool call failed: {source}")]
    Tool {
        node_id: NodeId,
        #[source]
        source: ToolError,
    },

    #[error("node '{node_id}' script failed: {source}")]
    Script {
        node_id: NodeId,
        #[source]
        source: SandboxError,
    },

    #[error("node '{node_id}' state access failed: {source}")]
    State {
        node_id: NodeId,
        #[source]
        source: StateError,
    },

    /// A condition selected an id that is not one of its candidates.
    #[error("node '{node_id}' selected unknown branch '{selected}'")]
    UnknownBranch { node_id: NodeId, selected: String },

    /// A condition returned something other than a candidate id or null.
    #[error("node '{node_id}' returned {value} where a branch id or null was expected")]
    InvalidBranchSelection { node_id: NodeId, value: Value },
}

impl EngineError {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Tool { node_id, .. }
            | Self::Script { node_id, .. }
            | Self::State { node_id, .. }
            | Self::UnknownBranch { node_id, .. }
            | Self::InvalidBranchSelection { node_id, .. } => node_id,
        }
    }
}

/// Failures of a [`WorkflowSource`](crate::WorkflowSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("workflow '{0}' not found")]
    NotFound(String),

    #[error("workflow id '{0}' is not valid")]
    InvalidId(String),

    #[error("workflow store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workflow '{id}' is invalid: {source}")]
    Invalid {
        id: String,
        #[source]
        source: TreeError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    #[error("todo item '{0}' not found")]
    NotFound(String),

    #[error("todo index {index} is out of range (list has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },
}
