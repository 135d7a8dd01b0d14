//! Workflow execution engine.
//!
//! `WorkflowExecutor` walks a workflow from the trigger's child to a
//! terminal node:
//! 1. Each node turns the running payload into the next payload (tool call,
//!    script, static value, state write).
//! 2. The node picks the single child to continue with; branches not taken
//!    are never visited.
//! 3. The run ends at `skip`, at an empty slot, or when a condition returns
//!    `null`. The payload at that point is the run's output.
//!
//! There is no retry at this layer and no rollback of state writes that
//! happened before a failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use sandbox::{transpile, EntryCall, ScriptRunner};
use state::StateStore;
use tools::{ToolCall, ToolInvoker};

use crate::error::EngineError;
use crate::models::{Node, NodeKind, Script, Workflow};
use crate::template;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Global function every script node must define.
    pub entry_point: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            entry_point: "handle".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// One visited node, in visiting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub node_id: String,
    pub node_type: String,
}

/// The result of running a full workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub run_id: Uuid,
    /// The payload when the run stopped.
    pub output: Value,
    pub trace: Vec<ExecutionStep>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator. One instance can serve any number of concurrent
/// runs; the only shared mutable resource is the state store.
pub struct WorkflowExecutor {
    invoker: Arc<dyn ToolInvoker>,
    runner: Arc<dyn ScriptRunner>,
    state: StateStore,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        runner: Arc<dyn ScriptRunner>,
        state: StateStore,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            invoker,
            runner,
            state,
            config,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Run `workflow` with `payload` as the trigger's output. State nodes
    /// read and write `namespace`.
    ///
    /// # Errors
    /// The first failing node aborts the run; the error names that node.
    #[instrument(skip(self, workflow, payload), fields(title = %workflow.title))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        namespace: &str,
        payload: Value,
    ) -> Result<ExecutionResult, EngineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "workflow run started");

        let mut trace = Vec::new();
        let mut payload = payload;
        let mut current = workflow.trigger.child.as_deref();

        while let Some(node) = current {
            trace.push(ExecutionStep {
                node_id: node.id.clone(),
                node_type: node.type_name().to_string(),
            });

            match self.step(node, namespace, payload).await {
                Ok((output, next)) => {
                    payload = output;
                    current = next;
                }
                Err(err) => {
                    error!(%run_id, node_id = %err.node_id(), "workflow run failed: {}", err);
                    return Err(err);
                }
            }
        }

        info!(%run_id, steps = trace.len(), "workflow run finished");
        Ok(ExecutionResult {
            run_id,
            output: payload,
            trace,
            started_at,
            finished_at: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Internal: one node transition.
    // -----------------------------------------------------------------------

    async fn step<'w>(
        &self,
        node: &'w Node,
        namespace: &str,
        payload: Value,
    ) -> Result<(Value, Option<&'w Node>), EngineError> {
        let node_id = node.id.as_str();
        debug!(node_id, node_type = node.type_name(), "entering node");

        match &node.kind {
            NodeKind::Tool { tool, child } => {
                let call = ToolCall {
                    tool_id: tool.tool_identifier.clone(),
                    input: payload,
                    input_schema: tool.input_schema.clone(),
                };
                let output = self
                    .invoker
                    .invoke(call)
                    .await
                    .map_err(|source| EngineError::Tool {
                        node_id: node_id.to_owned(),
                        source,
                    })?;
                Ok((output, child.as_deref()))
            }

            NodeKind::Converter { script, child } => {
                let output = self.call_script(node_id, script, namespace, payload).await?;
                Ok((output, child.as_deref()))
            }

            NodeKind::Boolean {
                script,
                true_child,
                false_child,
            } => {
                let verdict = self
                    .call_script(node_id, script, namespace, payload.clone())
                    .await?;
                let branch = if truthy(&verdict) { true_child } else { false_child };
                if branch.is_none() {
                    debug!(node_id, "selected branch is empty; run ends here");
                }
                Ok((payload, branch.as_deref()))
            }

            NodeKind::Condition { script, children } => {
                let selection = self
                    .call_script(node_id, script, namespace, payload.clone())
                    .await?;
                let next = match selection {
                    Value::Null => None,
                    Value::String(selected) => Some(
                        children
                            .iter()
                            .find(|candidate| candidate.id == selected)
                            .ok_or_else(|| EngineError::UnknownBranch {
                                node_id: node_id.to_owned(),
                                selected,
                            })?,
                    ),
                    other => {
                        return Err(EngineError::InvalidBranchSelection {
                            node_id: node_id.to_owned(),
                            value: other,
                        })
                    }
                };
                Ok((payload, next))
            }

            NodeKind::FixedInput { value, child } => Ok((value.clone(), child.as_deref())),

            NodeKind::UpsertState { key, value, child } => {
                let snapshot = if template::references_state(value) {
                    self.snapshot(node_id, namespace).await?
                } else {
                    Map::new()
                };
                let rendered = template::render(value, &payload, &snapshot);
                self.state
                    .set(namespace, key, rendered.clone())
                    .await
                    .map_err(|source| EngineError::State {
                        node_id: node_id.to_owned(),
                        source,
                    })?;
                Ok((rendered, child.as_deref()))
            }

            NodeKind::Skip {} => Ok((payload, None)),
        }
    }

    async fn snapshot(&self, node_id: &str, namespace: &str) -> Result<Map<String, Value>, EngineError> {
        let entries = self
            .state
            .list(namespace)
            .await
            .map_err(|source| EngineError::State {
                node_id: node_id.to_owned(),
                source,
            })?;
        Ok(entries.into_iter().collect())
    }

    /// Call the script's entry point with `{input, state}`.
    async fn call_script(
        &self,
        node_id: &str,
        script: &Script,
        namespace: &str,
        payload: Value,
    ) -> Result<Value, EngineError> {
        let snapshot = self.snapshot(node_id, namespace).await?;
        let compiled = transpile(&script.code, script.runtime);
        let call = EntryCall::function(
            &self.config.entry_point,
            vec![json!({ "input": payload, "state": snapshot })],
        );
        self.runner
            .execute(&compiled, &call)
            .await
            .map_err(|source| EngineError::Script {
                node_id: node_id.to_owned(),
                source,
            })
    }
}

/// Script-language truthiness of a JSON value.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::truthy;
    use serde_json::json;

    #[test]
    fn truthiness_follows_script_semantics() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy_value in [json!(true), json!(-1), json!("no"), json!([]), json!({})] {
            assert!(truthy(&truthy_value), "{truthy_value} should be truthy");
        }
    }
}
