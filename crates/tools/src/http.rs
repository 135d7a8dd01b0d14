//! `HttpToolInvoker`: dispatches tool calls to a remote invocation service.
//!
//! Wire format: `POST {base_url}` with `{"toolId": ..., "input": ...}`;
//! the service answers `{"output": ...}` on success. Non-2xx answers are
//! reported as [`ToolError::Rejected`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::{ToolCall, ToolError, ToolInvoker};

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    output: Value,
}

#[derive(Debug, Clone)]
pub struct HttpToolInvoker {
    base_url: String,
    timeout: Duration,
}

impl HttpToolInvoker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    fn call_blocking(url: &str, timeout: Duration, call: &ToolCall) -> Result<Value, ToolError> {
        let body = json!({ "toolId": call.tool_id, "input": call.input });
        let response = match ureq::post(url).timeout(timeout).send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                return Err(ToolError::Rejected {
                    tool_id: call.tool_id.clone(),
                    message: format!("HTTP {code}: {detail}"),
                });
            }
            Err(e) => return Err(ToolError::Transport(e.to_string())),
        };

        let decoded: InvokeResponse = response
            .into_json()
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
        Ok(decoded.output)
    }
}

#[async_trait]
impl ToolInvoker for HttpToolInvoker {
    #[instrument(skip(self, call), fields(tool_id = %call.tool_id))]
    async fn invoke(&self, call: ToolCall) -> Result<Value, ToolError> {
        let url = self.base_url.clone();
        let timeout = self.timeout;
        debug!("dispatching tool call to {url}");

        tokio::task::spawn_blocking(move || Self::call_blocking(&url, timeout, &call))
            .await
            .map_err(|e| ToolError::Transport(format!("invoker task failed: {e}")))?
    }
}
