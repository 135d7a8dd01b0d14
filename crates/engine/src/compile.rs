//! The workflow compile pass: static validation of every node before any
//! run. All problems are collected so a builder can fix them in one go.

use tracing::{info, instrument, warn};

use sandbox::{SandboxError, ScriptRunner};
use tools::ToolRegistry;

use crate::error::ValidationFailure;
use crate::models::{NodeKind, Script, Workflow};

impl Workflow {
    /// Check tool references against `registry` with one batched lookup and
    /// syntax-check every script through `runner`. Nothing is executed.
    #[instrument(skip_all, fields(title = %self.title))]
    pub async fn compile(
        &self,
        registry: &dyn ToolRegistry,
        runner: &dyn ScriptRunner,
    ) -> Result<(), Vec<ValidationFailure>> {
        let mut tool_nodes: Vec<(&str, &str)> = Vec::new();
        let mut script_nodes: Vec<(&str, &Script)> = Vec::new();
        if let Some(root) = self.trigger.child.as_deref() {
            root.walk(&mut |node| match &node.kind {
                NodeKind::Tool { tool, .. } => {
                    tool_nodes.push((node.id.as_str(), tool.tool_identifier.as_str()))
                }
                kind => {
                    if let Some(script) = kind.script() {
                        script_nodes.push((node.id.as_str(), script));
                    }
                }
            });
        }

        let mut failures = Vec::new();

        let mut identifiers: Vec<String> = Vec::new();
        for (_, tool_id) in &tool_nodes {
            if !identifiers.iter().any(|known| known == tool_id) {
                identifiers.push((*tool_id).to_owned());
            }
        }
        if !identifiers.is_empty() {
            match registry.check_exist(&identifiers).await {
                Ok(missing) => {
                    for (node_id, tool_id) in &tool_nodes {
                        if missing.iter().any(|m| m == tool_id) {
                            failures.push(ValidationFailure::MissingTool {
                                node_id: (*node_id).to_owned(),
                                tool_identifier: (*tool_id).to_owned(),
                            });
                        }
                    }
                }
                Err(err) => failures.push(ValidationFailure::RegistryUnavailable {
                    message: err.to_string(),
                }),
            }
        }

        for (node_id, script) in script_nodes {
            match runner.compile(&script.code, script.runtime).await {
                Ok(_) => {}
                Err(SandboxError::Syntax { message, line }) => {
                    failures.push(ValidationFailure::ScriptSyntax {
                        node_id: node_id.to_owned(),
                        message,
                        line,
                    })
                }
                Err(other) => failures.push(ValidationFailure::ScriptRejected {
                    node_id: node_id.to_owned(),
                    message: other.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            info!("workflow compiled cleanly");
            Ok(())
        } else {
            warn!(failures = failures.len(), "workflow failed to compile");
            Err(failures)
        }
    }
}
