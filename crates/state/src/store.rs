//! Namespaced façade over a [`StateBackend`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::{StateBackend, StateError};

const KEY_PREFIX: &str = "state";
const SEPARATOR: char = ':';

/// Every key is stored as `state:{namespace}:{key}`. Because namespaces may
/// not contain the separator, the prefix of one namespace is never a prefix
/// of another's keys.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    fn prefix(namespace: &str) -> Result<String, StateError> {
        if namespace.is_empty() || namespace.contains(SEPARATOR) {
            return Err(StateError::InvalidNamespace(namespace.to_owned()));
        }
        Ok(format!("{KEY_PREFIX}{SEPARATOR}{namespace}{SEPARATOR}"))
    }

    fn qualify(namespace: &str, key: &str) -> Result<String, StateError> {
        Ok(format!("{}{key}", Self::prefix(namespace)?))
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StateError> {
        self.backend.get(&Self::qualify(namespace, key)?).await
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StateError> {
        let full = Self::qualify(namespace, key)?;
        self.backend.set(&full, value).await?;
        debug!("state write");
        Ok(())
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool, StateError> {
        self.backend.delete(&Self::qualify(namespace, key)?).await
    }

    /// All entries of `namespace`, keyed by their unqualified key.
    pub async fn list(&self, namespace: &str) -> Result<BTreeMap<String, Value>, StateError> {
        let prefix = Self::prefix(namespace)?;
        let entries = self.backend.list_prefix(&prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|short| (short.to_owned(), v)))
            .collect())
    }

    /// Remove every entry of `namespace`; returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, namespace: &str) -> Result<u64, StateError> {
        let prefix = Self::prefix(namespace)?;
        self.backend.delete_prefix(&prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use serde_json::json;

    fn store() -> StateStore {
        StateStore::new(Arc::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let store = store();
        store.set("wf", "count", json!(3)).await.unwrap();
        assert_eq!(store.get("wf", "count").await.unwrap(), Some(json!(3)));
        assert!(store.delete("wf", "count").await.unwrap());
        assert_eq!(store.get("wf", "count").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespaces_do_not_leak() {
        let store = store();
        store.set("a", "k", json!("from a")).await.unwrap();
        store.set("ab", "k", json!("from ab")).await.unwrap();

        assert_eq!(store.get("b", "k").await.unwrap(), None);
        let listed = store.list("a").await.unwrap();
        assert_eq!(listed, BTreeMap::from([("k".to_string(), json!("from a"))]));

        assert_eq!(store.clear("a").await.unwrap(), 1);
        assert_eq!(store.get("ab", "k").await.unwrap(), Some(json!("from ab")));
    }

    #[tokio::test]
    async fn keys_may_contain_the_separator() {
        let store = store();
        store.set("wf", "user:42", json!(true)).await.unwrap();
        let listed = store.list("wf").await.unwrap();
        assert_eq!(listed.get("user:42"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn invalid_namespaces_are_rejected() {
        let store = store();
        for ns in ["", "a:b"] {
            let err = store.set(ns, "k", json!(1)).await.unwrap_err();
            assert!(matches!(err, StateError::InvalidNamespace(_)));
        }
    }
}
