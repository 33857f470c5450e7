//! Persisted fetch state and the stores that hold it between invocations.

use super::timestamp;
use crate::traits::{ConnectorError, ConnectorResult, LogEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// The watermark: how far fetching has progressed plus the unreleased backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Upper bound of the last window fetched to completion.
    #[serde(with = "timestamp::serde_format")]
    pub last_run_time: DateTime<Utc>,
    /// Entries fetched but not yet handed to the caller, oldest first.
    #[serde(default)]
    pub pending_entries: Vec<LogEntry>,
}

/// Key-value persistence for a single fetcher instance.
///
/// The fetcher calls `load` once and `save` at most once per invocation.
/// Callers must not run two invocations against the same store concurrently.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the stored checkpoint, or `None` before the first successful save.
    async fn load(&self) -> ConnectorResult<Option<Checkpoint>>;

    /// Replaces the stored checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> ConnectorResult<()>;
}

/// In-process checkpoint store.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    state: Arc<RwLock<Option<Checkpoint>>>,
    saves: Arc<RwLock<usize>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `checkpoint`.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            state: Arc::new(RwLock::new(Some(checkpoint))),
            saves: Arc::new(RwLock::new(0)),
        }
    }

    /// Current contents, for inspection.
    pub async fn snapshot(&self) -> Option<Checkpoint> {
        self.state.read().await.clone()
    }

    /// Number of times `save` has been called.
    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> ConnectorResult<Option<Checkpoint>> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> ConnectorResult<()> {
        *self.state.write().await = Some(checkpoint.clone());
        *self.saves.write().await += 1;
        Ok(())
    }
}

/// Checkpoint store backed by a JSON file.
///
/// Saves write a sibling `.tmp` file and rename it over the target, so the
/// file on disk always holds one complete checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_error(action: &str, path: &Path, e: impl std::fmt::Display) -> ConnectorError {
    ConnectorError::Storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> ConnectorResult<Option<Checkpoint>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint file yet");
                return Ok(None);
            }
            Err(e) => return Err(storage_error("read", &self.path, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| storage_error("parse", &self.path, e))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> ConnectorResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create directory for", &self.path, e))?;
        }

        let contents = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| storage_error("serialize", &self.path, e))?;

        // The tmp file must be durable before it replaces the checkpoint.
        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| storage_error("create", &temp, e))?;
        file.write_all(&contents)
            .await
            .map_err(|e| storage_error("write", &temp, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_error("sync", &temp, e))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| storage_error("replace", &self.path, e))?;

        debug!(
            path = %self.path.display(),
            pending = checkpoint.pending_entries.len(),
            "Checkpoint saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_checkpoint() -> Checkpoint {
        Checkpoint {
            last_run_time: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap(),
            pending_entries: vec![json!({"uuid": "a"}), json!({"uuid": "b"})],
        }
    }

    #[test]
    fn test_checkpoint_wire_format() {
        let value = serde_json::to_value(sample_checkpoint()).unwrap();
        assert_eq!(value["last_run_time"], "2024-02-01T12:00:00Z");
        assert_eq!(value["pending_entries"][1]["uuid"], "b");

        let restored: Checkpoint =
            serde_json::from_str(r#"{"last_run_time":"2024-02-01T12:00:00Z"}"#).unwrap();
        assert!(restored.pending_entries.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample_checkpoint()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample_checkpoint()));
        assert_eq!(store.save_count().await, 1);
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("state.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = FileCheckpointStore::new(&path);

        store.save(&sample_checkpoint()).await.unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
        assert_eq!(store.load().await.unwrap(), Some(sample_checkpoint()));

        let mut next = sample_checkpoint();
        next.pending_entries.clear();
        store.save(&next).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(next));
    }

    #[tokio::test]
    async fn test_file_store_replaces_stale_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let stale = dir.path().join("state.json.tmp");
        std::fs::write(&stale, "").unwrap();

        let store = FileCheckpointStore::new(&path);
        store.save(&sample_checkpoint()).await.unwrap();

        assert!(!stale.exists());
        let on_disk: Checkpoint =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, sample_checkpoint());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileCheckpointStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(ConnectorError::Storage(_))
        ));
    }
}
