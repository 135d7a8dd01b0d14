//! Postgres-backed state: one row per fully qualified key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use tracing::debug;

use crate::{StateBackend, StateError, StatePool};

#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: StatePool,
}

impl PostgresBackend {
    pub fn new(pool: StatePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateBackend for PostgresBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        let row = sqlx::query("SELECT value FROM state_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<Value, _>("value")?),
            None => None,
        })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError> {
        sqlx::query(
            r#"
            INSERT INTO state_entries (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        debug!("upserted state key '{}'", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StateError> {
        let result = sqlx::query("DELETE FROM state_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<BTreeMap<String, Value>, StateError> {
        // `left(...)` avoids LIKE, where `_` and `%` in keys would be wildcards.
        let rows = sqlx::query(
            "SELECT key, value FROM state_entries WHERE left(key, length($1)) = $1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = BTreeMap::new();
        for row in rows {
            entries.insert(row.try_get::<String, _>("key")?, row.try_get::<Value, _>("value")?);
        }
        Ok(entries)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StateError> {
        let result = sqlx::query("DELETE FROM state_entries WHERE left(key, length($1)) = $1")
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
