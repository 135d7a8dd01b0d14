use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use engine::{ExecutionResult, ValidationFailure};

use super::AppState;
use crate::error::ApiError;

/// Run the workflow to completion and return its output and trace.
#[instrument(skip(state, payload))]
pub async fn execute(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let workflow = state.source.load(&workflow_id).await?;
    let result = state.executor.run(&workflow, &workflow_id, payload).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct CompileReport {
    pub ok: bool,
    pub failures: Vec<ValidationFailure>,
}

/// Validate the stored workflow without running it. Validation failures
/// are a normal outcome and come back with 200.
#[instrument(skip(state))]
pub async fn compile(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CompileReport>, ApiError> {
    let workflow = state.source.load(&workflow_id).await?;
    let failures = match workflow
        .compile(state.registry.as_ref(), state.runner.as_ref())
        .await
    {
        Ok(()) => Vec::new(),
        Err(failures) => failures,
    };
    Ok(Json(CompileReport {
        ok: failures.is_empty(),
        failures,
    }))
}
