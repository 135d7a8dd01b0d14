//! `{{input.path}}` / `{{state.key}}` placeholders in upsert-state values.
//!
//! Strings are rendered recursively inside arrays and objects. A string
//! that is exactly one placeholder becomes the referenced JSON value
//! itself; placeholders embedded in longer text are interpolated, with
//! strings inserted raw and other values as compact JSON. Unknown paths
//! render as `null` (or as nothing inside text).

use serde_json::{Map, Value};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Render every placeholder in `value` against the running payload and the
/// namespace's state snapshot.
pub fn render(value: &Value, input: &Value, state: &Map<String, Value>) -> Value {
    match value {
        Value::String(text) => render_string(text, input, state),
        Value::Array(items) => Value::Array(items.iter().map(|v| render(v, input, state)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), render(v, input, state)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Whether any placeholder in `value` reads from state.
pub fn references_state(value: &Value) -> bool {
    match value {
        Value::String(text) => placeholders(text).any(|expr| root_of(expr) == "state"),
        Value::Array(items) => items.iter().any(references_state),
        Value::Object(fields) => fields.values().any(references_state),
        _ => false,
    }
}

fn render_string(text: &str, input: &Value, state: &Map<String, Value>) -> Value {
    let trimmed = text.trim();
    if let Some(expr) = sole_placeholder(trimmed) {
        return lookup(expr, input, state).cloned().unwrap_or(Value::Null);
    }
    if !text.contains(OPEN) {
        return Value::String(text.to_owned());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let Some(len) = rest[start + OPEN.len()..].find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let expr = rest[start + OPEN.len()..start + OPEN.len() + len].trim();
        match lookup(expr, input, state) {
            Some(Value::String(s)) => out.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &rest[start + OPEN.len() + len + CLOSE.len()..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn sole_placeholder(text: &str) -> Option<&str> {
    let inner = text.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    (!inner.contains(OPEN) && !inner.contains(CLOSE)).then(|| inner.trim())
}

fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    text.split(OPEN)
        .skip(1)
        .filter_map(|chunk| chunk.split_once(CLOSE).map(|(expr, _)| expr.trim()))
}

fn root_of(expr: &str) -> &str {
    expr.split('.').next().unwrap_or_default()
}

fn lookup<'a>(expr: &str, input: &'a Value, state: &'a Map<String, Value>) -> Option<&'a Value> {
    let mut parts = expr.split('.');
    match parts.next()? {
        "input" => parts.try_fold(input, step),
        "state" => {
            let key = parts.next()?;
            parts.try_fold(state.get(key)?, step)
        }
        _ => None,
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
