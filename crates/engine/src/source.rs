//! Where workflows come from when a trigger fires.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::SourceError;
use crate::models::Workflow;

/// Read access to stored workflows, keyed by an opaque id.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn load(&self, id: &str) -> Result<Workflow, SourceError>;

    /// Ids of every stored workflow, sorted.
    async fn list(&self) -> Result<Vec<String>, SourceError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    workflows: Arc<RwLock<BTreeMap<String, Workflow>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: impl Into<String>, workflow: Workflow) {
        self.workflows.write().await.insert(id.into(), workflow);
    }
}

#[async_trait]
impl WorkflowSource for MemorySource {
    async fn load(&self, id: &str) -> Result<Workflow, SourceError> {
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_owned()))
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.workflows.read().await.keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Directory of `{id}.json` files
// ---------------------------------------------------------------------------

/// Each `*.json` file in `root` holds one workflow document; its file stem
/// is the workflow id. Files are re-read on every load.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, SourceError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(SourceError::InvalidId(id.to_owned()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

#[async_trait]
impl WorkflowSource for DirectorySource {
    async fn load(&self, id: &str) -> Result<Workflow, SourceError> {
        let path = self.path_for(id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(id.to_owned()))
            }
            Err(err) => return Err(err.into()),
        };
        Workflow::from_json(&raw).map_err(|source| SourceError::Invalid {
            id: id.to_owned(),
            source,
        })
    }

    async fn list(&self) -> Result<Vec<String>, SourceError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => ids.push(stem.to_owned()),
                None => warn!(path = %path.display(), "skipping workflow file with a non-UTF-8 name"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronExpression;
    use crate::models::Trigger;

    fn workflow(title: &str) -> Workflow {
        Workflow::new(title, Trigger::cron("t", CronExpression::parse("0 0 * * *").unwrap()))
    }

    #[tokio::test]
    async fn memory_source_lists_and_loads() {
        let source = MemorySource::new();
        source.insert("b", workflow("second")).await;
        source.insert("a", workflow("first")).await;
        assert_eq!(source.list().await.unwrap(), vec!["a", "b"]);
        assert_eq!(source.load("a").await.unwrap().title, "first");
        assert!(matches!(source.load("zzz").await, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn directory_source_reads_json_files() {
        let dir = std::env::temp_dir().join(format!("workflow-source-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let text = workflow("nightly").to_json_pretty().unwrap();
        tokio::fs::write(dir.join("nightly.json"), text).await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "ignored").await.unwrap();
        tokio::fs::write(dir.join("broken.json"), "{").await.unwrap();

        let source = DirectorySource::new(&dir);
        assert_eq!(source.list().await.unwrap(), vec!["broken", "nightly"]);
        assert_eq!(source.load("nightly").await.unwrap().title, "nightly");
        assert!(matches!(source.load("broken").await, Err(SourceError::Invalid { .. })));
        assert!(matches!(source.load("missing").await, Err(SourceError::NotFound(_))));
        assert!(matches!(source.load("../etc/passwd").await, Err(SourceError::InvalidId(_))));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
