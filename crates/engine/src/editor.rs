//! Builder session: incremental workflow construction by a human or agent.
//!
//! Callers describe nodes by payload only ([`NodeDraft`]). The session mints
//! ids, snapshots tool metadata from the registry, applies the tree
//! mutation and keeps a [`TodoList`] for the builder's own bookkeeping.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use sandbox::ScriptRunner;
use tools::ToolRegistry;

use crate::cron::CronExpression;
use crate::error::{TreeError, ValidationFailure};
use crate::models::{Node, NodeId, NodeKind, Script, ToolSpec, Trigger, TriggerKind, Workflow};
use crate::todo::TodoList;
use crate::tree::Branch;

/// A node as a builder describes it: payload only, no id, no children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeDraft {
    Tool { tool_identifier: String },
    Converter {
        #[serde(flatten)]
        script: Script,
    },
    Boolean {
        #[serde(flatten)]
        script: Script,
    },
    Condition {
        #[serde(flatten)]
        script: Script,
    },
    FixedInput { value: Value },
    UpsertState { key: String, value: Value },
    Skip {},
}

pub struct WorkflowEditor {
    workflow: Workflow,
    registry: Arc<dyn ToolRegistry>,
    runner: Arc<dyn ScriptRunner>,
    todos: TodoList,
}

impl WorkflowEditor {
    pub fn new(
        workflow: Workflow,
        registry: Arc<dyn ToolRegistry>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self {
            workflow,
            registry,
            runner,
            todos: TodoList::new(),
        }
    }

    /// Start from an empty workflow with a cron trigger.
    pub fn create(
        title: impl Into<String>,
        cron: &str,
        registry: Arc<dyn ToolRegistry>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Result<Self, TreeError> {
        let trigger = Trigger::cron(Uuid::new_v4().to_string(), CronExpression::parse(cron)?);
        Ok(Self::new(Workflow::new(title, trigger), registry, runner))
    }

    async fn materialise(&self, id: NodeId, draft: NodeDraft) -> Result<Node, TreeError> {
        let kind = match draft {
            NodeDraft::Tool { tool_identifier } => {
                let description = self
                    .registry
                    .describe(&tool_identifier)
                    .await
                    .map_err(|source| TreeError::ToolLookup {
                        tool_identifier: tool_identifier.clone(),
                        source,
                    })?;
                NodeKind::Tool {
                    tool: ToolSpec {
                        tool_identifier,
                        description: description.description,
                        input_schema: description.input_schema,
                        output_schema: description.output_schema,
                    },
                    child: None,
                }
            }
            NodeDraft::Converter { script } => NodeKind::Converter { script, child: None },
            NodeDraft::Boolean { script } => NodeKind::Boolean {
                script,
                true_child: None,
                false_child: None,
            },
            NodeDraft::Condition { script } => NodeKind::Condition {
                script,
                children: Vec::new(),
            },
            NodeDraft::FixedInput { value } => NodeKind::FixedInput { value, child: None },
            NodeDraft::UpsertState { key, value } => NodeKind::UpsertState {
                key,
                value,
                child: None,
            },
            NodeDraft::Skip {} => NodeKind::Skip {},
        };
        Ok(Node::new(id, kind))
    }

    /// Splice a new node below `parent_id` (the trigger when `None`/blank).
    #[instrument(skip(self, draft))]
    pub async fn add_after(
        &mut self,
        parent_id: Option<&str>,
        draft: NodeDraft,
    ) -> Result<NodeId, TreeError> {
        let node = self.materialise(Uuid::new_v4().to_string(), draft).await?;
        let id = node.id.clone();
        self.workflow.add_after(parent_id, node)?;
        debug!(node_id = %id, "node added");
        Ok(id)
    }

    #[instrument(skip(self, draft))]
    pub async fn add_child(
        &mut self,
        parent_id: Option<&str>,
        draft: NodeDraft,
        branch: Option<Branch>,
    ) -> Result<NodeId, TreeError> {
        let node = self.materialise(Uuid::new_v4().to_string(), draft).await?;
        let id = node.id.clone();
        self.workflow.add_child(parent_id, node, branch)?;
        debug!(node_id = %id, "child added");
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> Result<Node, TreeError> {
        self.workflow.remove(id)
    }

    /// Replace a node's payload; tool drafts are described afresh.
    pub async fn modify(&mut self, id: &str, draft: NodeDraft) -> Result<(), TreeError> {
        if self.workflow.find_node(id).is_none() {
            return Err(TreeError::NodeNotFound(id.to_owned()));
        }
        let node = self.materialise(id.to_owned(), draft).await?;
        self.workflow.modify_node(id, node)
    }

    pub fn swap(&mut self, a: &str, b: &str) -> Result<(), TreeError> {
        self.workflow.swap(a, b)
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.workflow.find_node(id)
    }

    /// Re-schedule the trigger. Invalid expressions are rejected here, not
    /// at run time.
    pub fn modify_trigger(&mut self, cron: &str) -> Result<(), TreeError> {
        let expression = CronExpression::parse(cron)?;
        self.workflow.modify_trigger(TriggerKind::Cron { expression });
        Ok(())
    }

    pub async fn compile(&self) -> Result<(), Vec<ValidationFailure>> {
        self.workflow
            .compile(self.registry.as_ref(), self.runner.as_ref())
            .await
    }

    pub fn to_viewable_string(&self) -> String {
        self.workflow.to_viewable_string()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }

    pub fn todos(&self) -> &TodoList {
        &self.todos
    }

    pub fn todos_mut(&mut self) -> &mut TodoList {
        &mut self.todos
    }
}
