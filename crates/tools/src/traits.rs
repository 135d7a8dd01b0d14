//! Collaborator contracts used by the workflow engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

/// Metadata snapshot of a tool, copied onto tool nodes when they are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

/// A single dispatch request handed to a [`ToolInvoker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_id: String,
    pub input: Value,
    /// Input schema cached on the node at creation time.
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub input_schema: Value,
}

/// Tool metadata lookups.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Describe a single tool.
    async fn describe(&self, tool_id: &str) -> Result<ToolDescription, ToolError>;

    /// Return the subset of `tool_ids` the registry does not know about,
    /// preserving the caller's order.
    async fn check_exist(&self, tool_ids: &[String]) -> Result<Vec<String>, ToolError>;
}

/// Tool dispatch.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run the tool and return its output payload.
    async fn invoke(&self, call: ToolCall) -> Result<Value, ToolError>;
}
