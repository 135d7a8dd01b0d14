//! Mutation API over a [`Workflow`] tree.
//!
//! Every mutation runs against a copy of the workflow and is committed only
//! when it succeeds, so a failed call never leaves a half-edited tree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TreeError;
use crate::models::{Node, NodeKind, Slot, TriggerKind, Workflow};

/// Which branch of a boolean node `add_child` should fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    True,
    False,
}

/// Route from the trigger to a node. The first step is always the
/// trigger's `child`.
type Path = Vec<Slot>;

/// A mutable handle on the position a node occupies.
enum SlotMut<'a> {
    Single(&'a mut Option<Box<Node>>),
    Candidate(&'a mut Vec<Node>, usize),
}

fn non_blank(id: Option<&str>) -> Option<&str> {
    id.map(str::trim).filter(|s| !s.is_empty())
}

impl Workflow {
    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Depth-first lookup below the trigger. A miss is `None`, not an error.
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.trigger.child.as_deref()?.find(id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.trigger.id == id || self.find_node(id).is_some()
    }

    fn path_to(&self, id: &str) -> Option<Path> {
        fn search(node: &Node, id: &str, path: &mut Path) -> bool {
            if node.id == id {
                return true;
            }
            for (slot, child) in node.kind.children() {
                path.push(slot);
                if search(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let root = self.trigger.child.as_deref()?;
        let mut path = vec![Slot::Child];
        search(root, id, &mut path).then_some(path)
    }

    fn node_at_mut(&mut self, path: &[Slot]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        if *first != Slot::Child {
            return None;
        }
        let mut current = self.trigger.child.as_deref_mut()?;
        for slot in rest {
            current = current.kind.child_at_mut(*slot)?;
        }
        Some(current)
    }

    fn slot_mut(&mut self, path: &[Slot]) -> Option<SlotMut<'_>> {
        let (last, parent_path) = path.split_last()?;
        if parent_path.is_empty() {
            return (*last == Slot::Child).then(|| SlotMut::Single(&mut self.trigger.child));
        }
        let parent = self.node_at_mut(parent_path)?;
        match (&mut parent.kind, *last) {
            (NodeKind::Boolean { true_child, .. }, Slot::TrueBranch) => {
                Some(SlotMut::Single(true_child))
            }
            (NodeKind::Boolean { false_child, .. }, Slot::FalseBranch) => {
                Some(SlotMut::Single(false_child))
            }
            (NodeKind::Condition { children, .. }, Slot::Candidate(i)) => {
                (i < children.len()).then(|| SlotMut::Candidate(children, i))
            }
            (kind, Slot::Child) => kind.single_slot_mut().map(SlotMut::Single),
            _ => None,
        }
    }

    /// Put `node` where `path` points and hand back what was there.
    fn replace_at(&mut self, path: &[Slot], node: Node) -> Option<Node> {
        match self.slot_mut(path)? {
            SlotMut::Single(slot) => slot.replace(Box::new(node)).map(|b| *b),
            SlotMut::Candidate(list, i) => Some(std::mem::replace(&mut list[i], node)),
        }
    }

    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Workflow) -> Result<T, TreeError>,
    ) -> Result<T, TreeError> {
        let mut draft = self.clone();
        let out = op(&mut draft)?;
        *self = draft;
        Ok(out)
    }

    /// Every id in `node`'s subtree must be non-empty and new to this tree.
    fn ensure_fresh_ids(&self, node: &Node) -> Result<(), TreeError> {
        let mut seen: HashSet<&str> = self.node_ids().into_iter().collect();
        let mut problem = None;
        node.walk(&mut |n| {
            if problem.is_some() {
                return;
            }
            if n.id.trim().is_empty() {
                problem = Some(TreeError::Malformed("node ids must not be empty".into()));
            } else if !seen.insert(n.id.as_str()) {
                problem = Some(TreeError::DuplicateId(n.id.clone()));
            }
        });
        problem.map_or(Ok(()), Err)
    }

    pub(crate) fn check_ids(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        for id in self.node_ids() {
            if id.trim().is_empty() {
                return Err(TreeError::Malformed("node ids must not be empty".into()));
            }
            if !seen.insert(id) {
                return Err(TreeError::DuplicateId(id.to_owned()));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Splice `node` in below `parent_id` (the trigger when blank). The
    /// parent's previous child moves under `node`.
    pub fn add_after(&mut self, parent_id: Option<&str>, node: Node) -> Result<(), TreeError> {
        self.ensure_fresh_ids(&node)?;
        let parent = non_blank(parent_id).filter(|p| *p != self.trigger.id);

        self.transact(|wf| {
            let slot = match parent {
                None => &mut wf.trigger.child,
                Some(pid) => {
                    let path = wf
                        .path_to(pid)
                        .ok_or_else(|| TreeError::NodeNotFound(pid.to_owned()))?;
                    let target = wf
                        .node_at_mut(&path)
                        .ok_or_else(|| TreeError::NodeNotFound(pid.to_owned()))?;
                    let node_type = target.type_name();
                    target.kind.single_slot_mut().ok_or_else(|| TreeError::WrongKind {
                        node_id: pid.to_owned(),
                        node_type,
                        reason: "has no single child slot to insert after",
                    })?
                }
            };

            let mut node = node;
            if let Some(previous) = slot.take() {
                node.kind
                    .attach_primary(*previous)
                    .map_err(|_| TreeError::WrongKind {
                        node_id: node.id.clone(),
                        node_type: node.type_name(),
                        reason: "has no open slot to take over the existing child",
                    })?;
            }
            *slot = Some(Box::new(node));
            Ok(())
        })
    }

    /// Attach `node` to an open slot of `parent_id` (the trigger when blank):
    /// a condition's candidate list, a boolean branch (the first open one
    /// unless `branch` says otherwise) or an empty regular child slot.
    pub fn add_child(
        &mut self,
        parent_id: Option<&str>,
        node: Node,
        branch: Option<Branch>,
    ) -> Result<(), TreeError> {
        self.ensure_fresh_ids(&node)?;
        let parent = non_blank(parent_id).filter(|p| *p != self.trigger.id);

        self.transact(|wf| {
            let Some(pid) = parent else {
                if branch.is_some() {
                    return Err(TreeError::WrongKind {
                        node_id: wf.trigger.id.clone(),
                        node_type: wf.trigger.kind.type_name(),
                        reason: "has no true/false branches",
                    });
                }
                if wf.trigger.child.is_some() {
                    return Err(TreeError::SlotOccupied {
                        node_id: wf.trigger.id.clone(),
                        slot: Slot::Child.name(),
                    });
                }
                wf.trigger.child = Some(Box::new(node));
                return Ok(());
            };

            let path = wf
                .path_to(pid)
                .ok_or_else(|| TreeError::NodeNotFound(pid.to_owned()))?;
            let target = wf
                .node_at_mut(&path)
                .ok_or_else(|| TreeError::NodeNotFound(pid.to_owned()))?;
            let node_type = target.type_name();
            let node_id = target.id.clone();

            match (&mut target.kind, branch) {
                (
                    NodeKind::Boolean {
                        true_child,
                        false_child,
                        ..
                    },
                    Some(branch),
                ) => {
                    let (slot, name) = match branch {
                        Branch::True => (true_child, Slot::TrueBranch.name()),
                        Branch::False => (false_child, Slot::FalseBranch.name()),
                    };
                    if slot.is_some() {
                        return Err(TreeError::SlotOccupied { node_id, slot: name });
                    }
                    *slot = Some(Box::new(node));
                    Ok(())
                }
                (_, Some(_)) => Err(TreeError::WrongKind {
                    node_id,
                    node_type,
                    reason: "has no true/false branches",
                }),
                (NodeKind::Skip {}, None) => Err(TreeError::WrongKind {
                    node_id,
                    node_type,
                    reason: "cannot hold children",
                }),
                (kind, None) => {
                    let slot = match kind {
                        NodeKind::Boolean { .. } => "trueChild/falseChild",
                        _ => Slot::Child.name(),
                    };
                    kind.attach_primary(node)
                        .map_err(|_| TreeError::SlotOccupied { node_id, slot })
                }
            }
        })
    }

    /// Detach node `id` and hand it back without its children, which take
    /// its place. A node with several children can only be removed from a
    /// condition's candidate list, where they all fit.
    pub fn remove(&mut self, id: &str) -> Result<Node, TreeError> {
        if id == self.trigger.id {
            return Err(TreeError::TriggerNotAllowed { operation: "remove" });
        }

        self.transact(|wf| {
            let not_found = || TreeError::NodeNotFound(id.to_owned());
            let path = wf.path_to(id).ok_or_else(not_found)?;
            match wf.slot_mut(&path).ok_or_else(not_found)? {
                SlotMut::Single(slot) => {
                    let mut removed = *slot.take().ok_or_else(not_found)?;
                    let mut orphans = removed.kind.detach_children();
                    if orphans.len() > 1 {
                        return Err(TreeError::WouldOrphan {
                            node_id: id.to_owned(),
                            children: orphans.len(),
                        });
                    }
                    *slot = orphans.pop().map(Box::new);
                    Ok(removed)
                }
                SlotMut::Candidate(list, index) => {
                    let mut removed = list.remove(index);
                    for (offset, orphan) in removed.kind.detach_children().into_iter().enumerate() {
                        list.insert(index + offset, orphan);
                    }
                    Ok(removed)
                }
            }
        })
    }

    /// Replace node `id`'s payload. The replacement must carry the same id;
    /// the existing children stay attached and any children on the
    /// replacement are ignored. Changing shape is allowed when the existing
    /// children fit the new node's slots.
    pub fn modify_node(&mut self, id: &str, replacement: Node) -> Result<(), TreeError> {
        if id == self.trigger.id {
            return Err(TreeError::TriggerNotAllowed { operation: "modify_node" });
        }
        if replacement.id != id {
            return Err(TreeError::IdMismatch {
                expected: id.to_owned(),
                found: replacement.id,
            });
        }

        self.transact(|wf| {
            let path = wf
                .path_to(id)
                .ok_or_else(|| TreeError::NodeNotFound(id.to_owned()))?;
            let target = wf
                .node_at_mut(&path)
                .ok_or_else(|| TreeError::NodeNotFound(id.to_owned()))?;

            let mut kind = replacement.kind;
            kind.detach_children();
            let from = target.type_name();
            let to = kind.type_name();
            if !transplant_children(&mut target.kind, &mut kind) {
                return Err(TreeError::ShapeMismatch {
                    node_id: id.to_owned(),
                    from,
                    to,
                });
            }
            target.kind = kind;
            Ok(())
        })
    }

    /// Exchange the positions of `a` and `b`; each keeps its own subtree.
    /// Applying the same swap twice restores the original tree.
    pub fn swap(&mut self, a: &str, b: &str) -> Result<(), TreeError> {
        if a == self.trigger.id || b == self.trigger.id {
            return Err(TreeError::TriggerNotAllowed { operation: "swap" });
        }
        let path_a = self
            .path_to(a)
            .ok_or_else(|| TreeError::NodeNotFound(a.to_owned()))?;
        let path_b = self
            .path_to(b)
            .ok_or_else(|| TreeError::NodeNotFound(b.to_owned()))?;
        if a == b {
            return Ok(());
        }
        if path_b.starts_with(&path_a) {
            return Err(TreeError::SelfReference {
                ancestor: a.to_owned(),
                descendant: b.to_owned(),
            });
        }
        if path_a.starts_with(&path_b) {
            return Err(TreeError::SelfReference {
                ancestor: b.to_owned(),
                descendant: a.to_owned(),
            });
        }

        self.transact(|wf| {
            let missing = |id: &str| TreeError::NodeNotFound(id.to_owned());
            let placeholder = Node::new(String::new(), NodeKind::Skip {});
            let node_a = wf.replace_at(&path_a, placeholder).ok_or_else(|| missing(a))?;
            let node_b = wf.replace_at(&path_b, node_a).ok_or_else(|| missing(b))?;
            wf.replace_at(&path_a, node_b).ok_or_else(|| missing(a))?;
            Ok(())
        })
    }

    /// Change the trigger's type and configuration, keeping its id and child.
    pub fn modify_trigger(&mut self, kind: TriggerKind) {
        self.trigger.kind = kind;
    }

    // -----------------------------------------------------------------------
    // Persisted form
    // -----------------------------------------------------------------------

    /// Parse the canonical document. Invalid cron expressions, duplicate
    /// ids and children under slots a node type does not have are rejected.
    pub fn from_json(raw: &str) -> Result<Self, TreeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| TreeError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, TreeError> {
        if let Some(child) = value.get("trigger").and_then(|t| t.get("child")) {
            check_child_slots(child)?;
        }
        let workflow: Workflow =
            serde_json::from_value(value).map_err(|e| TreeError::Malformed(e.to_string()))?;
        workflow.check_ids()?;
        Ok(workflow)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

const CHILD_SLOT_KEYS: [&str; 4] = ["child", "trueChild", "falseChild", "children"];

/// Serde ignores unknown fields on the flattened node variants, so a child
/// under a slot the node's type lacks would be dropped without a word.
/// Walk the raw document and refuse such nodes instead. `null` slots are
/// accepted everywhere.
fn check_child_slots(node: &Value) -> Result<(), TreeError> {
    let Some(fields) = node.as_object() else {
        return Ok(());
    };
    let node_type = fields.get("type").and_then(Value::as_str).unwrap_or_default();
    let owned: &[&str] = match node_type {
        "tool" | "converter" | "fixed-input" | "upsert-state" => &["child"],
        "boolean" => &["trueChild", "falseChild"],
        "condition" => &["children"],
        _ => &[],
    };

    for key in CHILD_SLOT_KEYS {
        let Some(slot) = fields.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        if !owned.contains(&key) {
            let id = fields.get("id").and_then(Value::as_str).unwrap_or("?");
            return Err(TreeError::Malformed(format!(
                "node '{id}' of type '{node_type}' has no '{key}' slot"
            )));
        }
        match slot {
            Value::Array(candidates) => candidates.iter().try_for_each(check_child_slots)?,
            single => check_child_slots(single)?,
        }
    }
    Ok(())
}

/// Move `from`'s children into `to`. Branch and candidate layouts carry
/// over between nodes of the same shape; otherwise children fill `to`'s
/// open positions in order. Returns false when they do not fit.
fn transplant_children(from: &mut NodeKind, to: &mut NodeKind) -> bool {
    match (from, to) {
        (
            NodeKind::Boolean {
                true_child: from_true,
                false_child: from_false,
                ..
            },
            NodeKind::Boolean {
                true_child,
                false_child,
                ..
            },
        ) => {
            *true_child = from_true.take();
            *false_child = from_false.take();
            true
        }
        (NodeKind::Condition { children: from_children, .. }, NodeKind::Condition { children, .. }) => {
            *children = std::mem::take(from_children);
            true
        }
        (from, to) => from
            .detach_children()
            .into_iter()
            .all(|child| to.attach_primary(child).is_ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronExpression;
    use crate::models::{Script, ToolSpec, Trigger};
    use serde_json::json;

    fn tool(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Tool {
                tool: ToolSpec {
                    tool_identifier: format!("{id}.tool"),
                    description: String::new(),
                    input_schema: Value::Null,
                    output_schema: Value::Null,
                },
                child: None,
            },
        )
    }

    fn converter(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Converter {
                script: Script::new("function handle(x) { return x.input; }"),
                child: None,
            },
        )
    }

    fn condition(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Condition {
                script: Script::new("function handle() { return null; }"),
                children: Vec::new(),
            },
        )
    }

    fn boolean(id: &str) -> Node {
        Node::new(
            id,
            NodeKind::Boolean {
                script: Script::new("function handle() { return true; }"),
                true_child: None,
                false_child: None,
            },
        )
    }

    fn skip(id: &str) -> Node {
        Node::new(id, NodeKind::Skip {})
    }

    fn empty() -> Workflow {
        Workflow::new(
            "test",
            Trigger::cron("trigger", CronExpression::parse("0 2 * * *").unwrap()),
        )
    }

    /// trigger -> a -> b -> c
    fn chain() -> Workflow {
        let mut wf = empty();
        wf.add_after(None, tool("c")).unwrap();
        wf.add_after(None, tool("b")).unwrap();
        wf.add_after(None, tool("a")).unwrap();
        wf
    }

    fn child_id(wf: &Workflow, id: &str) -> Option<String> {
        wf.find_node(id)?
            .kind
            .children()
            .first()
            .map(|(_, n)| n.id.clone())
    }

    #[test]
    fn add_after_splices_the_previous_child() {
        let mut wf = chain();
        wf.add_after(Some("a"), converter("x")).unwrap();
        assert_eq!(child_id(&wf, "a").as_deref(), Some("x"));
        assert_eq!(child_id(&wf, "x").as_deref(), Some("b"));
        assert_eq!(wf.node_ids(), vec!["trigger", "a", "x", "b", "c"]);
    }

    #[test]
    fn add_after_blank_parent_targets_the_trigger() {
        let mut wf = chain();
        wf.add_after(Some("  "), tool("first")).unwrap();
        assert_eq!(wf.node_ids()[1], "first");
        assert_eq!(child_id(&wf, "first").as_deref(), Some("a"));
    }

    #[test]
    fn add_after_rejects_multi_child_parents_and_unknown_ids() {
        let mut wf = empty();
        wf.add_after(None, condition("cond")).unwrap();
        let before = wf.clone();

        assert!(matches!(
            wf.add_after(Some("cond"), tool("t")),
            Err(TreeError::WrongKind { .. })
        ));
        assert!(matches!(
            wf.add_after(Some("ghost"), tool("t")),
            Err(TreeError::NodeNotFound(_))
        ));
        assert_eq!(wf, before);
    }

    #[test]
    fn add_after_a_skip_with_a_successor_fails_without_mutating() {
        let mut wf = chain();
        let before = wf.clone();
        assert!(wf.add_after(Some("a"), skip("s")).is_err());
        assert_eq!(wf, before);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut wf = chain();
        assert!(matches!(wf.add_after(None, tool("b")), Err(TreeError::DuplicateId(id)) if id == "b"));
        assert!(matches!(
            wf.add_child(None, tool("trigger"), None),
            Err(TreeError::DuplicateId(_))
        ));
    }

    #[test]
    fn add_child_appends_candidates_and_fills_branches() {
        let mut wf = empty();
        wf.add_child(None, condition("cond"), None).unwrap();
        wf.add_child(Some("cond"), tool("c1"), None).unwrap();
        wf.add_child(Some("cond"), boolean("c2"), None).unwrap();
        wf.add_child(Some("c2"), skip("no"), Some(Branch::False)).unwrap();
        wf.add_child(Some("c2"), skip("yes"), None).unwrap();

        match &wf.find_node("c2").unwrap().kind {
            NodeKind::Boolean { true_child, false_child, .. } => {
                assert_eq!(true_child.as_ref().unwrap().id, "yes");
                assert_eq!(false_child.as_ref().unwrap().id, "no");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(wf.node_ids(), vec!["trigger", "cond", "c1", "c2", "yes", "no"]);
    }

    #[test]
    fn add_child_refuses_occupied_slots() {
        let mut wf = chain();
        assert!(matches!(
            wf.add_child(None, tool("t"), None),
            Err(TreeError::SlotOccupied { .. })
        ));
        assert!(matches!(
            wf.add_child(Some("a"), tool("t"), None),
            Err(TreeError::SlotOccupied { .. })
        ));
        assert!(matches!(
            wf.add_child(Some("c"), tool("t"), Some(Branch::True)),
            Err(TreeError::WrongKind { .. })
        ));
        // `c` is a leaf, so it has room.
        wf.add_child(Some("c"), skip("end"), None).unwrap();
        assert_eq!(child_id(&wf, "c").as_deref(), Some("end"));
    }

    #[test]
    fn remove_reattaches_the_child() {
        let mut wf = chain();
        let removed = wf.remove("b").unwrap();
        assert_eq!(removed.id, "b");
        assert!(wf.find_node("b").is_none());
        assert_eq!(child_id(&wf, "a").as_deref(), Some("c"));
    }

    #[test]
    fn remove_from_candidates_splices_all_children_in_place() {
        let mut wf = empty();
        wf.add_child(None, condition("outer"), None).unwrap();
        wf.add_child(Some("outer"), tool("first"), None).unwrap();
        wf.add_child(Some("outer"), condition("inner"), None).unwrap();
        wf.add_child(Some("outer"), tool("last"), None).unwrap();
        wf.add_child(Some("inner"), tool("i1"), None).unwrap();
        wf.add_child(Some("inner"), tool("i2"), None).unwrap();

        wf.remove("inner").unwrap();
        assert_eq!(wf.node_ids(), vec!["trigger", "outer", "first", "i1", "i2", "last"]);
    }

    #[test]
    fn remove_refuses_to_orphan_branches_and_the_trigger() {
        let mut wf = empty();
        wf.add_after(None, boolean("b")).unwrap();
        wf.add_child(Some("b"), skip("t"), None).unwrap();
        wf.add_child(Some("b"), skip("f"), None).unwrap();
        let before = wf.clone();

        assert!(matches!(wf.remove("b"), Err(TreeError::WouldOrphan { children: 2, .. })));
        assert!(matches!(wf.remove("trigger"), Err(TreeError::TriggerNotAllowed { .. })));
        assert!(matches!(wf.remove("ghost"), Err(TreeError::NodeNotFound(_))));
        assert_eq!(wf, before);
    }

    #[test]
    fn modify_node_keeps_id_and_children() {
        let mut wf = chain();
        let replacement = Node::new(
            "b",
            NodeKind::FixedInput {
                value: json!({ "fixed": true }),
                child: Some(Box::new(skip("ignored"))),
            },
        );
        wf.modify_node("b", replacement).unwrap();
        let b = wf.find_node("b").unwrap();
        assert_eq!(b.type_name(), "fixed-input");
        assert_eq!(child_id(&wf, "b").as_deref(), Some("c"));
        assert!(wf.find_node("ignored").is_none());
    }

    #[test]
    fn modify_node_rejects_mismatches() {
        let mut wf = chain();
        assert!(matches!(
            wf.modify_node("b", tool("other")),
            Err(TreeError::IdMismatch { .. })
        ));
        assert!(matches!(
            wf.modify_node("b", skip("b")),
            Err(TreeError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            wf.modify_node("ghost", tool("ghost")),
            Err(TreeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn swap_exchanges_positions_with_subtrees() {
        let mut wf = empty();
        wf.add_child(None, condition("cond"), None).unwrap();
        wf.add_child(Some("cond"), tool("left"), None).unwrap();
        wf.add_child(Some("cond"), tool("right"), None).unwrap();
        wf.add_child(Some("left"), skip("left-end"), None).unwrap();
        let original = wf.clone();

        wf.swap("left", "right").unwrap();
        assert_eq!(wf.node_ids(), vec!["trigger", "cond", "right", "left", "left-end"]);

        wf.swap("left", "right").unwrap();
        assert_eq!(wf, original);
    }

    #[test]
    fn swap_rejects_trigger_and_ancestors() {
        let mut wf = chain();
        assert!(matches!(wf.swap("trigger", "a"), Err(TreeError::TriggerNotAllowed { .. })));
        assert!(matches!(wf.swap("a", "c"), Err(TreeError::SelfReference { .. })));
        assert!(matches!(wf.swap("c", "a"), Err(TreeError::SelfReference { .. })));
    }

    #[test]
    fn modify_trigger_keeps_the_child() {
        let mut wf = chain();
        wf.modify_trigger(TriggerKind::Cron {
            expression: CronExpression::parse("*/5 * * * *").unwrap(),
        });
        assert_eq!(wf.trigger.cron_expression().unwrap().as_str(), "*/5 * * * *");
        assert_eq!(wf.node_ids(), vec!["trigger", "a", "b", "c"]);
    }

    #[test]
    fn from_value_rejects_children_under_missing_slots() {
        let skip_with_child = json!({
            "title": "lossy",
            "trigger": {
                "id": "t", "type": "cron", "expression": "0 0 * * *",
                "child": { "id": "s", "type": "skip",
                           "child": { "id": "lost", "type": "skip" } }
            }
        });
        assert!(matches!(Workflow::from_value(skip_with_child), Err(TreeError::Malformed(_))));

        let tool_with_children = json!({
            "title": "lossy",
            "trigger": {
                "id": "t", "type": "cron", "expression": "0 0 * * *",
                "child": { "id": "a", "type": "tool", "toolIdentifier": "A",
                           "children": [{ "id": "lost2", "type": "skip" }] }
            }
        });
        assert!(matches!(Workflow::from_value(tool_with_children), Err(TreeError::Malformed(_))));

        let nested = json!({
            "title": "lossy",
            "trigger": {
                "id": "t", "type": "cron", "expression": "0 0 * * *",
                "child": { "id": "c", "type": "condition", "code": "null",
                           "children": [{ "id": "b", "type": "boolean", "code": "true",
                                          "child": { "id": "lost3", "type": "skip" } }] }
            }
        });
        assert!(matches!(Workflow::from_value(nested), Err(TreeError::Malformed(_))));

        let null_slot = json!({
            "title": "fine",
            "trigger": {
                "id": "t", "type": "cron", "expression": "0 0 * * *",
                "child": { "id": "s", "type": "skip", "child": null }
            }
        });
        assert_eq!(Workflow::from_value(null_slot).unwrap().node_ids(), vec!["t", "s"]);
    }

    #[test]
    fn from_json_round_trips_and_rejects_duplicates() {
        let wf = chain();
        let text = wf.to_json_pretty().unwrap();
        assert_eq!(Workflow::from_json(&text).unwrap(), wf);

        let dup = json!({
            "title": "dup",
            "trigger": {
                "id": "t", "type": "cron", "expression": "0 0 * * *",
                "child": { "id": "x", "type": "converter", "code": "1",
                           "child": { "id": "x", "type": "skip" } }
            }
        });
        assert!(matches!(Workflow::from_value(dup), Err(TreeError::DuplicateId(_))));

        let bad_cron = json!({
            "title": "bad",
            "trigger": { "id": "t", "type": "cron", "expression": "0 25 * * *" }
        });
        assert!(matches!(Workflow::from_value(bad_cron), Err(TreeError::Malformed(_))));
    }
}
