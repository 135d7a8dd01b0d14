//! Human-readable rendering of a workflow tree.

use std::fmt::Write;

use crate::models::{Node, NodeKind, Slot, TriggerKind, Workflow};

const VALUE_PREVIEW_CHARS: usize = 48;

impl Workflow {
    /// Indented outline of the tree, one node per line.
    ///
    /// ```text
    /// Workflow "nightly sync"
    /// cron trigger (0 2 * * *)
    /// └── tool fetch [crm.export]
    ///     └── skip done
    /// ```
    pub fn to_viewable_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Workflow \"{}\"", self.title);
        match &self.trigger.kind {
            TriggerKind::Cron { expression } => {
                let _ = writeln!(out, "cron {} ({})", self.trigger.id, expression);
            }
        }
        if let Some(child) = self.trigger.child.as_deref() {
            render_node(&mut out, child, "", true, None);
        }
        out
    }
}

fn render_node(out: &mut String, node: &Node, prefix: &str, last: bool, label: Option<String>) {
    let connector = if last { "└── " } else { "├── " };
    let label = label.map(|l| format!("{l}: ")).unwrap_or_default();
    let _ = writeln!(
        out,
        "{prefix}{connector}{label}{} {}{}",
        node.type_name(),
        node.id,
        summary(&node.kind)
    );

    let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
    let children = node.kind.children();
    let count = children.len();
    for (i, (slot, child)) in children.into_iter().enumerate() {
        let label = match slot {
            Slot::Child => None,
            Slot::TrueBranch => Some("true".to_string()),
            Slot::FalseBranch => Some("false".to_string()),
            Slot::Candidate(n) => Some(format!("#{}", n + 1)),
        };
        render_node(out, child, &child_prefix, i + 1 == count, label);
    }
}

fn summary(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Tool { tool, .. } => format!(" [{}]", tool.tool_identifier),
        NodeKind::Converter { script, .. }
        | NodeKind::Boolean { script, .. }
        | NodeKind::Condition { script, .. } => {
            let runtime = script.runtime.map_or("auto", |d| d.as_str());
            format!(" [{} lines, {runtime}]", script.code.lines().count())
        }
        NodeKind::FixedInput { value, .. } => format!(" = {}", preview(&value.to_string())),
        NodeKind::UpsertState { key, value, .. } => {
            format!(" [{key} = {}]", preview(&value.to_string()))
        }
        NodeKind::Skip {} => String::new(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= VALUE_PREVIEW_CHARS {
        return text.to_owned();
    }
    let cut: String = text.chars().take(VALUE_PREVIEW_CHARS).collect();
    format!("{cut}…")
}
