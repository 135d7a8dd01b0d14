//! `ToolCatalog`: a [`ToolRegistry`] backed by an in-process map.
//!
//! The catalog file is a JSON object keyed by tool identifier:
//!
//! ```json
//! { "weather.lookup": { "description": "...", "inputSchema": {}, "outputSchema": {} } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::{ToolDescription, ToolError, ToolRegistry};

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDescription>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration, mostly useful in tests.
    pub fn with_tool(mut self, tool_id: impl Into<String>, description: ToolDescription) -> Self {
        self.tools.insert(tool_id.into(), description);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ToolError> {
        let tools: BTreeMap<String, ToolDescription> = serde_json::from_str(raw)
            .map_err(|e| ToolError::InvalidResponse(format!("invalid tool catalog: {e}")))?;
        Ok(Self { tools })
    }

    /// Read a catalog file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::Transport(format!("cannot read {}: {e}", path.display())))?;
        let catalog = Self::from_json_str(&raw)?;
        debug!("loaded {} tools from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolRegistry for ToolCatalog {
    async fn describe(&self, tool_id: &str) -> Result<ToolDescription, ToolError> {
        self.tools
            .get(tool_id)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(tool_id.to_owned()))
    }

    async fn check_exist(&self, tool_ids: &[String]) -> Result<Vec<String>, ToolError> {
        Ok(tool_ids
            .iter()
            .filter(|id| !self.tools.contains_key(id.as_str()))
            .cloned()
            .collect())
    }
}
