//! `api` crate: HTTP surface over the workflow engine.
//!
//! Endpoints:
//! - `POST /api/v1/webhook/:workflow_id`: start a run in the background (202).
//! - `POST /api/v1/workflows/:workflow_id/execute`: run to completion and
//!   return the output and trace.
//! - `POST /api/v1/workflows/:workflow_id/compile`: static validation only.
//!
//! Request bodies are the trigger payload (any JSON value). Runs started
//! over HTTP use the workflow id as their state namespace.

pub mod error;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::{routing::post, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use engine::{WorkflowExecutor, WorkflowSource};
use sandbox::ScriptRunner;
use tools::ToolRegistry;

pub use error::ApiError;

/// Shared handles every request needs.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn WorkflowSource>,
    pub executor: Arc<WorkflowExecutor>,
    pub registry: Arc<dyn ToolRegistry>,
    pub runner: Arc<dyn ScriptRunner>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/webhook/:workflow_id", post(handlers::webhooks::handle_webhook))
        .route("/api/v1/workflows/:workflow_id/execute", post(handlers::workflows::execute))
        .route("/api/v1/workflows/:workflow_id/compile", post(handlers::workflows::compile))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests;
