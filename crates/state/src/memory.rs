//! In-process backend for tests and single-node deployments without Postgres.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{StateBackend, StateError};

/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys across all namespaces.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StateError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<BTreeMap<String, Value>, StateError> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StateError> {
        let mut entries = self.entries.write().await;
        let doomed: Vec<String> = entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn prefix_operations_only_touch_matching_keys() {
        let backend = MemoryBackend::new();
        backend.set("state:a:1", json!(1)).await.unwrap();
        backend.set("state:a:2", json!(2)).await.unwrap();
        backend.set("state:ab:1", json!(3)).await.unwrap();
        backend.set("state:b:1", json!(4)).await.unwrap();

        let listed = backend.list_prefix("state:a:").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed["state:a:2"], json!(2));

        assert_eq!(backend.delete_prefix("state:a:").await.unwrap(), 2);
        assert_eq!(backend.len().await, 2);
        assert_eq!(backend.get("state:ab:1").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_value_existed() {
        let backend = MemoryBackend::new();
        backend.set("k", json!("v")).await.unwrap();
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
    }
}
