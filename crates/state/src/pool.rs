//! Postgres connection pool and schema migrations.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::StateError;

/// Shared Postgres pool used by [`PostgresBackend`](crate::PostgresBackend).
pub type StatePool = PgPool;

/// Connection settings for the Postgres backend.
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StateConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
        }
    }
}

/// Create a new connection pool from `config`.
pub async fn create_pool(config: &StateConfig) -> Result<StatePool, StateError> {
    info!("Connecting to state database (max_connections={})", config.max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Apply the embedded migrations in `crates/state/migrations`.
pub async fn run_migrations(pool: &StatePool) -> Result<(), StateError> {
    info!("Running state migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
