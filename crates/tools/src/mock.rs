//! `MockToolInvoker`: a test double for [`ToolInvoker`].
//!
//! Useful in unit and scenario tests where a real tool service is
//! unavailable or irrelevant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{ToolCall, ToolError, ToolInvoker};

/// Behaviour injected per tool identifier.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Hand the input back unchanged.
    Echo,
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with the given error.
    Fail(ToolError),
}

/// A mock invoker that records every call it receives and answers with a
/// programmer-specified behaviour. Unknown tools fail with
/// [`ToolError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct MockToolInvoker {
    behaviours: HashMap<String, MockBehaviour>,
    /// All calls seen by this invoker (in call order).
    pub calls: Arc<Mutex<Vec<ToolCall>>>,
}

impl MockToolInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echoing(mut self, tool_id: impl Into<String>) -> Self {
        self.behaviours.insert(tool_id.into(), MockBehaviour::Echo);
        self
    }

    pub fn returning(mut self, tool_id: impl Into<String>, value: Value) -> Self {
        self.behaviours
            .insert(tool_id.into(), MockBehaviour::ReturnValue(value));
        self
    }

    pub fn failing(mut self, tool_id: impl Into<String>, error: ToolError) -> Self {
        self.behaviours.insert(tool_id.into(), MockBehaviour::Fail(error));
        self
    }

    /// Number of dispatches received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Tool identifiers in dispatch order.
    pub fn dispatched_tools(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.tool_id.clone())
            .collect()
    }
}

#[async_trait]
impl ToolInvoker for MockToolInvoker {
    async fn invoke(&self, call: ToolCall) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(call.clone());

        match self.behaviours.get(&call.tool_id) {
            Some(MockBehaviour::Echo) => Ok(call.input),
            Some(MockBehaviour::ReturnValue(v)) => Ok(v.clone()),
            Some(MockBehaviour::Fail(e)) => Err(e.clone()),
            None => Err(ToolError::NotFound(call.tool_id)),
        }
    }
}
