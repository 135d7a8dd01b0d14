//! Mapping of engine failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use engine::{EngineError, SourceError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Execution(#[from] EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Source(SourceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Source(SourceError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            Self::Source(SourceError::Invalid { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Source(SourceError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Execution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {self}");
        }
        let body = match &self {
            Self::Execution(err) => json!({ "error": err.to_string(), "nodeId": err.node_id() }),
            Self::Source(err) => json!({ "error": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
