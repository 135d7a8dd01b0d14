//! Router tests driven through `tower::ServiceExt::oneshot`; no socket is
//! bound.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use engine::{ExecutorConfig, MemorySource, Workflow, WorkflowExecutor};
use sandbox::{DisabledHttp, Sandbox, SandboxConfig};
use state::{MemoryBackend, StateStore};
use tools::mock::MockToolInvoker;
use tools::{ToolCatalog, ToolDescription, ToolError};

use crate::{router, AppState};

// ===========================================================================
// Fixtures
// ===========================================================================

struct TestApp {
    router: Router,
    invoker: MockToolInvoker,
    state: StateStore,
}

fn echo_then_double() -> Workflow {
    Workflow::from_value(json!({
        "title": "double",
        "trigger": {
            "id": "t", "type": "cron", "expression": "0 * * * *",
            "child": {
                "id": "fetch", "type": "tool", "toolIdentifier": "echo",
                "child": {
                    "id": "double", "type": "converter",
                    "code": "function handle({ input }) { return { n: input.n * 2 }; }",
                    "child": { "id": "done", "type": "skip" }
                }
            }
        }
    }))
    .unwrap()
}

fn remember_payload() -> Workflow {
    Workflow::from_value(json!({
        "title": "remember",
        "trigger": {
            "id": "t", "type": "cron", "expression": "0 * * * *",
            "child": { "id": "save", "type": "upsert-state", "key": "last", "value": "{{input.n}}" }
        }
    }))
    .unwrap()
}

fn broken_tool() -> Workflow {
    Workflow::from_value(json!({
        "title": "broken",
        "trigger": {
            "id": "t", "type": "cron", "expression": "0 * * * *",
            "child": {
                "id": "call", "type": "tool", "toolIdentifier": "flaky",
                "child": { "id": "check", "type": "converter", "code": "function handle( {" }
            }
        }
    }))
    .unwrap()
}

async fn app() -> TestApp {
    let source = MemorySource::new();
    source.insert("double", echo_then_double()).await;
    source.insert("remember", remember_payload()).await;
    source.insert("broken", broken_tool()).await;

    let invoker = MockToolInvoker::new()
        .echoing("echo")
        .failing("flaky", ToolError::Transport("connection reset".into()));
    let runner = Arc::new(Sandbox::with_http(SandboxConfig::default(), Arc::new(DisabledHttp)));
    let state = StateStore::new(Arc::new(MemoryBackend::new()));
    let executor = WorkflowExecutor::new(
        Arc::new(invoker.clone()),
        runner.clone(),
        state.clone(),
        ExecutorConfig::default(),
    );
    let registry = ToolCatalog::new().with_tool(
        "echo",
        ToolDescription {
            description: "returns its input".into(),
            input_schema: Value::Null,
            output_schema: Value::Null,
        },
    );

    let router = router(AppState {
        source: Arc::new(source),
        executor: Arc::new(executor),
        registry: Arc::new(registry),
        runner,
    });
    TestApp { router, invoker, state }
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// ===========================================================================
// execute
// ===========================================================================

#[tokio::test]
async fn execute_returns_output_and_trace() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/double/execute", json!({ "n": 21 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], json!({ "n": 42 }));
    let visited: Vec<&str> = body["trace"]
        .as_array()
        .unwrap()
        .iter()
        .map(|step| step["nodeId"].as_str().unwrap())
        .collect();
    assert_eq!(visited, vec!["fetch", "double", "done"]);
    assert_eq!(app.invoker.dispatched_tools(), vec!["echo"]);
}

#[tokio::test]
async fn execute_unknown_workflow_is_not_found() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/nope/execute", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn execute_failure_names_the_node() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/broken/execute", json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["nodeId"], "call");
}

#[tokio::test]
async fn execute_uses_workflow_id_as_namespace() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/remember/execute", json!({ "n": 7 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], json!(7));
    assert_eq!(app.state.get("remember", "last").await.unwrap(), Some(json!(7)));
}

// ===========================================================================
// webhook
// ===========================================================================

#[tokio::test]
async fn webhook_accepts_and_runs_in_background() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/webhook/remember", json!({ "n": 3 })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["workflowId"], "remember");

    let mut stored = None;
    for _ in 0..50 {
        stored = app.state.get("remember", "last").await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored, Some(json!(3)));
}

#[tokio::test]
async fn webhook_for_unknown_workflow_is_rejected_up_front() {
    let app = app().await;
    let (status, _) = post(&app.router, "/api/v1/webhook/ghost", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.invoker.call_count(), 0);
}

// ===========================================================================
// compile
// ===========================================================================

#[tokio::test]
async fn compile_reports_every_failure() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/broken/compile", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);

    let kinds: Vec<&str> = body["failures"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"missing-tool"), "{body}");
    assert!(kinds.contains(&"script-syntax"), "{body}");
}

#[tokio::test]
async fn compile_accepts_a_valid_workflow() {
    let app = app().await;
    let (status, body) = post(&app.router, "/api/v1/workflows/double/compile", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "failures": [] }));
    assert_eq!(app.invoker.call_count(), 0);
}
