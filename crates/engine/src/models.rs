//! Core domain models for the workflow tree.
//!
//! A workflow is a tree rooted at its [`Trigger`]. Each [`NodeKind`] carries
//! exactly the child slots its shape allows: one `child` for regular nodes,
//! `trueChild`/`falseChild` for booleans, an ordered candidate list for
//! conditions, and none for `skip`. The serialised form of these types is
//! the canonical persisted document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sandbox::Dialect;

use crate::cron::CronExpression;

pub type NodeId = String;

// ---------------------------------------------------------------------------
// Payload pieces
// ---------------------------------------------------------------------------

/// User-authored code run in the sandbox. `runtime` is auto-detected when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<Dialect>,
}

impl Script {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            runtime: None,
        }
    }
}

/// Tool reference plus the metadata snapshot taken when the node was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub tool_identifier: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeKind {
    Tool {
        #[serde(flatten)]
        tool: ToolSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child: Option<Box<Node>>,
    },
    Converter {
        #[serde(flatten)]
        script: Script,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child: Option<Box<Node>>,
    },
    Boolean {
        #[serde(flatten)]
        script: Script,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        true_child: Option<Box<Node>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        false_child: Option<Box<Node>>,
    },
    Condition {
        #[serde(flatten)]
        script: Script,
        #[serde(default)]
        children: Vec<Node>,
    },
    FixedInput {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child: Option<Box<Node>>,
    },
    UpsertState {
        key: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child: Option<Box<Node>>,
    },
    /// Terminal marker.
    Skip {},
}

/// Addresses one child position inside a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Child,
    TrueBranch,
    FalseBranch,
    Candidate(usize),
}

impl Slot {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Slot::Child => "child",
            Slot::TrueBranch => "trueChild",
            Slot::FalseBranch => "falseChild",
            Slot::Candidate(_) => "children",
        }
    }
}

impl NodeKind {
    /// The `type` tag as it appears in the persisted form.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Tool { .. } => "tool",
            NodeKind::Converter { .. } => "converter",
            NodeKind::Boolean { .. } => "boolean",
            NodeKind::Condition { .. } => "condition",
            NodeKind::FixedInput { .. } => "fixed-input",
            NodeKind::UpsertState { .. } => "upsert-state",
            NodeKind::Skip {} => "skip",
        }
    }

    pub fn script(&self) -> Option<&Script> {
        match self {
            NodeKind::Converter { script, .. }
            | NodeKind::Boolean { script, .. }
            | NodeKind::Condition { script, .. } => Some(script),
            _ => None,
        }
    }

    /// The lone child slot of a regular node; `None` for other shapes.
    pub(crate) fn single_slot_mut(&mut self) -> Option<&mut Option<Box<Node>>> {
        match self {
            NodeKind::Tool { child, .. }
            | NodeKind::Converter { child, .. }
            | NodeKind::FixedInput { child, .. }
            | NodeKind::UpsertState { child, .. } => Some(child),
            _ => None,
        }
    }

    pub(crate) fn has_single_slot(&self) -> bool {
        matches!(
            self,
            NodeKind::Tool { .. }
                | NodeKind::Converter { .. }
                | NodeKind::FixedInput { .. }
                | NodeKind::UpsertState { .. }
        )
    }

    /// Occupied child positions in traversal order, with their slots.
    pub(crate) fn children(&self) -> Vec<(Slot, &Node)> {
        match self {
            NodeKind::Tool { child, .. }
            | NodeKind::Converter { child, .. }
            | NodeKind::FixedInput { child, .. }
            | NodeKind::UpsertState { child, .. } => {
                child.iter().map(|c| (Slot::Child, c.as_ref())).collect()
            }
            NodeKind::Boolean {
                true_child,
                false_child,
                ..
            } => true_child
                .iter()
                .map(|c| (Slot::TrueBranch, c.as_ref()))
                .chain(false_child.iter().map(|c| (Slot::FalseBranch, c.as_ref())))
                .collect(),
            NodeKind::Condition { children, .. } => children
                .iter()
                .enumerate()
                .map(|(i, c)| (Slot::Candidate(i), c))
                .collect(),
            NodeKind::Skip {} => Vec::new(),
        }
    }

    pub(crate) fn child_at(&self, slot: Slot) -> Option<&Node> {
        match (self, slot) {
            (NodeKind::Boolean { true_child, .. }, Slot::TrueBranch) => true_child.as_deref(),
            (NodeKind::Boolean { false_child, .. }, Slot::FalseBranch) => false_child.as_deref(),
            (NodeKind::Condition { children, .. }, Slot::Candidate(i)) => children.get(i),
            (
                NodeKind::Tool { child, .. }
                | NodeKind::Converter { child, .. }
                | NodeKind::FixedInput { child, .. }
                | NodeKind::UpsertState { child, .. },
                Slot::Child,
            ) => child.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn child_at_mut(&mut self, slot: Slot) -> Option<&mut Node> {
        match (self, slot) {
            (NodeKind::Boolean { true_child, .. }, Slot::TrueBranch) => true_child.as_deref_mut(),
            (NodeKind::Boolean { false_child, .. }, Slot::FalseBranch) => false_child.as_deref_mut(),
            (NodeKind::Condition { children, .. }, Slot::Candidate(i)) => children.get_mut(i),
            (kind, Slot::Child) => kind.single_slot_mut().and_then(|c| c.as_deref_mut()),
            _ => None,
        }
    }

    /// Remove and return every child, in traversal order.
    pub(crate) fn detach_children(&mut self) -> Vec<Node> {
        match self {
            NodeKind::Boolean {
                true_child,
                false_child,
                ..
            } => true_child
                .take()
                .into_iter()
                .chain(false_child.take())
                .map(|b| *b)
                .collect(),
            NodeKind::Condition { children, .. } => std::mem::take(children),
            other => other
                .single_slot_mut()
                .and_then(|c| c.take())
                .map(|b| vec![*b])
                .unwrap_or_default(),
        }
    }

    /// Place `node` in this node's first open position: the child slot,
    /// the true branch (then the false one), or the end of the candidate
    /// list. Hands the node back when there is no room.
    pub(crate) fn attach_primary(&mut self, node: Node) -> Result<(), Node> {
        match self {
            NodeKind::Boolean {
                true_child,
                false_child,
                ..
            } => {
                if true_child.is_none() {
                    *true_child = Some(Box::new(node));
                } else if false_child.is_none() {
                    *false_child = Some(Box::new(node));
                } else {
                    return Err(node);
                }
                Ok(())
            }
            NodeKind::Condition { children, .. } => {
                children.push(node);
                Ok(())
            }
            other => match other.single_slot_mut() {
                Some(slot) if slot.is_none() => {
                    *slot = Some(Box::new(node));
                    Ok(())
                }
                _ => Err(node),
            },
        }
    }
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self { id: id.into(), kind }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Depth-first visit of this node and everything below it.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        visit(self);
        for (_, child) in self.kind.children() {
            child.walk(visit);
        }
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.kind
            .children()
            .into_iter()
            .find_map(|(_, child)| child.find(id))
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is started. Only cron schedules exist today; webhooks can
/// fire any workflow regardless of its trigger kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    Cron { expression: CronExpression },
}

impl TriggerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TriggerKind::Cron { .. } => "cron",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<Node>>,
}

impl Trigger {
    pub fn cron(id: impl Into<NodeId>, expression: CronExpression) -> Self {
        Self {
            id: id.into(),
            kind: TriggerKind::Cron { expression },
            child: None,
        }
    }

    pub fn cron_expression(&self) -> Option<&CronExpression> {
        match &self.kind {
            TriggerKind::Cron { expression } => Some(expression),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub title: String,
    pub trigger: Trigger,
}

impl Workflow {
    pub fn new(title: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            title: title.into(),
            trigger,
        }
    }

    /// Every node id in the tree, trigger first, in depth-first order.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.trigger.id.as_str()];
        if let Some(child) = self.trigger.child.as_deref() {
            child.walk(&mut |n| ids.push(n.id.as_str()));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn persisted_form_uses_camel_case_and_kebab_tags() {
        let node = Node::new(
            "b1",
            NodeKind::Boolean {
                script: Script::new("function handle() { return true; }"),
                true_child: Some(Box::new(Node::new("s1", NodeKind::Skip {}))),
                false_child: None,
            },
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "b1",
                "type": "boolean",
                "code": "function handle() { return true; }",
                "trueChild": { "id": "s1", "type": "skip" }
            })
        );
        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn tool_nodes_flatten_their_spec() {
        let raw = json!({
            "id": "t1",
            "type": "tool",
            "toolIdentifier": "weather.lookup",
            "inputSchema": { "type": "object" },
            "child": { "id": "f1", "type": "fixed-input", "value": [1, 2] }
        });
        let node: Node = serde_json::from_value(raw).unwrap();
        match &node.kind {
            NodeKind::Tool { tool, child } => {
                assert_eq!(tool.tool_identifier, "weather.lookup");
                assert_eq!(tool.output_schema, Value::Null);
                assert_eq!(child.as_ref().map(|c| c.type_name()), Some("fixed-input"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn attach_primary_fills_branches_in_order() {
        let mut kind = NodeKind::Boolean {
            script: Script::new("x"),
            true_child: None,
            false_child: None,
        };
        kind.attach_primary(Node::new("a", NodeKind::Skip {})).unwrap();
        kind.attach_primary(Node::new("b", NodeKind::Skip {})).unwrap();
        assert!(kind.attach_primary(Node::new("c", NodeKind::Skip {})).is_err());
        let ids: Vec<_> = kind.children().into_iter().map(|(_, n)| n.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
