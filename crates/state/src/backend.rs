//! The storage seam behind [`StateStore`](crate::StateStore).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::StateError;

/// A flat key-value store. Keys arrive fully qualified; namespacing is the
/// job of [`StateStore`](crate::StateStore).
///
/// Each call must be atomic on its own. Nothing spans calls.
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError>;

    /// Returns whether a value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StateError>;

    /// Every entry whose key starts with `prefix`, keyed by the full key.
    async fn list_prefix(&self, prefix: &str) -> Result<BTreeMap<String, Value>, StateError>;

    /// Remove every entry whose key starts with `prefix`; returns how many.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StateError>;
}
