//! The single host capability exposed to sandboxed scripts: `http(request)`.
//!
//! Scripts call `http({ url, method, headers, params, data })` and get back
//! `{ data, status, statusText }`. Transport failures throw inside the script.
//! Non-2xx answers are ordinary responses.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query string parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// JSON request body.
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    /// Parsed JSON body, or the raw text when the body is not JSON.
    pub data: Value,
    pub status: u16,
    pub status_text: String,
}

/// Host side of the `http` capability.
///
/// Called synchronously from the interpreter thread; `timeout` is whatever is
/// left of the script's wall-clock budget.
pub trait HttpCapability: Send + Sync {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, String>;
}

/// Real outbound HTTP via `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqHttp;

impl HttpCapability for UreqHttp {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, String> {
        let mut call = ureq::request(&request.method.to_uppercase(), &request.url).timeout(timeout);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }
        for (name, value) in &request.params {
            call = call.query(name, value);
        }

        let outcome = match &request.data {
            Some(body) => call.send_json(body.clone()),
            None => call.call(),
        };
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(e.to_string()),
        };

        let status = response.status();
        let status_text = response.status_text().to_string();
        let body = response.into_string().map_err(|e| e.to_string())?;
        let data = serde_json::from_str(&body).unwrap_or(Value::String(body));

        Ok(HttpResponse {
            data,
            status,
            status_text,
        })
    }
}

/// Refuses every request. Used where scripts must stay offline.
#[derive(Debug, Clone, Default)]
pub struct DisabledHttp;

impl HttpCapability for DisabledHttp {
    fn send(&self, request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse, String> {
        Err(format!("outbound http is disabled (request to {})", request.url))
    }
}
