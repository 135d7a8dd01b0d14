//! Typed error type for the state crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    /// Namespaces must be non-empty and may not contain the `:` separator.
    #[error("invalid state namespace '{0}'")]
    InvalidNamespace(String),

    #[error("state backend error: {0}")]
    Backend(String),

    #[error("state value could not be (de)serialised: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StateError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
