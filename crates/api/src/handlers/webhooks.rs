use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use super::AppState;
use crate::error::ApiError;

/// Load the workflow, then run it in the background with the request body
/// as the trigger payload. The caller only learns that the run started.
#[instrument(skip(state, payload))]
pub async fn handle_webhook(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let workflow = state.source.load(&workflow_id).await?;

    let executor = state.executor.clone();
    let namespace = workflow_id.clone();
    tokio::spawn(async move {
        match executor.run(&workflow, &namespace, payload).await {
            Ok(result) => info!(workflow_id = %namespace, run_id = %result.run_id, "webhook run finished"),
            Err(err) => error!(workflow_id = %namespace, node_id = %err.node_id(), "webhook run failed: {err}"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "webhook accepted", "workflowId": workflow_id })),
    ))
}
