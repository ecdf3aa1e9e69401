//! Durable run checkpoints.
//!
//! A checkpoint is a full snapshot of the known item IDs and every stored
//! record of one run. It is written locally through a temp file and then
//! mirrored to object storage under `<remote_prefix>/<run>.json`. Runs named
//! by date also share a [`KnownIdsStore`] at a fixed path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ItemId, StoredRecord};
use crate::storage::{ObjectStore, StorageError};

/// Errors reading or writing checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize checkpoint: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint mirror failed: {0}")]
    Storage(#[from] StorageError),

    #[error("checkpoint {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

/// Snapshot of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub run: String,
    pub saved_at: DateTime<Utc>,
    /// Set by the final write of a run.
    #[serde(default)]
    pub complete: bool,
    /// Frontier IDs in insertion order.
    #[serde(default)]
    pub known_ids: Vec<ItemId>,
    #[serde(default = "Vec::new")]
    pub records: Vec<StoredRecord<T>>,
}

/// A JSON document written locally and mirrored to object storage.
#[derive(Clone)]
struct MirroredFile {
    dir: PathBuf,
    name: String,
    remote_prefix: String,
    remote: Option<Arc<dyn ObjectStore>>,
}

impl MirroredFile {
    fn new(dir: PathBuf, name: String) -> Self {
        Self {
            dir,
            name,
            remote_prefix: "files".to_string(),
            remote: None,
        }
    }

    fn mirrored(mut self, store: Arc<dyn ObjectStore>, prefix: String) -> Self {
        self.remote = Some(store);
        self.remote_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    fn local_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.name))
    }

    fn remote_path(&self) -> String {
        if self.remote_prefix.is_empty() {
            format!("{}.json", self.name)
        } else {
            format!("{}/{}.json", self.remote_prefix, self.name)
        }
    }

    async fn write(&self, body: Vec<u8>) -> Result<(), CheckpointError> {
        let dir = self.dir.clone();
        let path = self.local_path();
        let local_body = body.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &local_body))
            .await
            .map_err(|e| CheckpointError::Io {
                path: self.local_path(),
                source: std::io::Error::other(e),
            })??;

        if let Some(ref remote) = self.remote {
            remote
                .put(&self.remote_path(), body, "application/json; charset=utf-8")
                .await?;
        }
        Ok(())
    }

    /// Local file first, then the remote mirror. Returns where the bytes came
    /// from, or `None` when neither exists.
    async fn read(&self) -> Result<Option<(String, Vec<u8>)>, CheckpointError> {
        let path = self.local_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => return Ok(Some((path.display().to_string(), bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(CheckpointError::Io { path, source }),
        }

        let Some(ref remote) = self.remote else {
            return Ok(None);
        };
        let remote_path = self.remote_path();
        match remote.get(&remote_path).await {
            Ok(bytes) => {
                info!("Restored {} from {}", self.name, remote_path);
                Ok(Some((remote_path, bytes)))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Local + remote checkpoint persistence for one run.
#[derive(Clone)]
pub struct CheckpointStore {
    file: MirroredFile,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>, run: impl Into<String>) -> Self {
        Self {
            file: MirroredFile::new(dir.into(), run.into()),
        }
    }

    /// Mirror every write to `store` under `prefix`.
    pub fn with_remote(mut self, store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        self.file = self.file.mirrored(store, prefix.into());
        self
    }

    pub fn run(&self) -> &str {
        &self.file.name
    }

    pub fn local_path(&self) -> PathBuf {
        self.file.local_path()
    }

    pub fn remote_path(&self) -> String {
        self.file.remote_path()
    }

    /// Write a full snapshot.
    pub async fn save<T: Serialize>(
        &self,
        known_ids: &[ItemId],
        records: &[StoredRecord<T>],
        complete: bool,
    ) -> Result<(), CheckpointError> {
        #[derive(Serialize)]
        struct Snapshot<'a, T> {
            run: &'a str,
            saved_at: DateTime<Utc>,
            complete: bool,
            known_ids: &'a [ItemId],
            records: &'a [StoredRecord<T>],
        }

        let body = serde_json::to_vec_pretty(&Snapshot {
            run: self.run(),
            saved_at: Utc::now(),
            complete,
            known_ids,
            records,
        })?;
        self.file.write(body).await?;

        debug!(
            "Checkpoint {} saved: {} ids, {} records{}",
            self.run(),
            known_ids.len(),
            records.len(),
            if complete { " (complete)" } else { "" }
        );
        Ok(())
    }

    /// Load the latest snapshot: local file, then remote mirror.
    ///
    /// `Ok(None)` is a cold start.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<Checkpoint<T>>, CheckpointError> {
        match self.file.read().await? {
            Some((source, bytes)) => decode(&source, &bytes).map(Some),
            None => {
                info!("No checkpoint for run {}, starting cold", self.run());
                Ok(None)
            }
        }
    }
}

/// Item ids handled by any earlier run, kept under a fixed name so that
/// dated runs share one frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownIds {
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub ids: Vec<ItemId>,
}

/// Persistence for [`KnownIds`]: `<dir>/<name>.json`, mirrored to
/// `<remote_prefix>/<name>.json`.
#[derive(Clone)]
pub struct KnownIdsStore {
    file: MirroredFile,
}

impl KnownIdsStore {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            file: MirroredFile::new(dir.into(), name.into()),
        }
    }

    pub fn with_remote(mut self, store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        self.file = self.file.mirrored(store, prefix.into());
        self
    }

    pub fn local_path(&self) -> PathBuf {
        self.file.local_path()
    }

    pub fn remote_path(&self) -> String {
        self.file.remote_path()
    }

    pub async fn save(&self, ids: &[ItemId]) -> Result<(), CheckpointError> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            saved_at: DateTime<Utc>,
            ids: &'a [ItemId],
        }

        let body = serde_json::to_vec_pretty(&Snapshot {
            saved_at: Utc::now(),
            ids,
        })?;
        self.file.write(body).await?;
        debug!("Known ids {} saved: {} ids", self.file.name, ids.len());
        Ok(())
    }

    /// Saved ids, empty when nothing was saved yet.
    pub async fn load(&self) -> Result<Vec<ItemId>, CheckpointError> {
        let Some((source, bytes)) = self.file.read().await? else {
            info!("No known ids at {}, starting empty", self.file.name);
            return Ok(Vec::new());
        };
        let known: KnownIds =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt {
                path: source,
                message: e.to_string(),
            })?;
        Ok(known.ids)
    }
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<Checkpoint<T>, CheckpointError> {
    serde_json::from_slice(bytes).map_err(|e| CheckpointError::Corrupt {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Write via a temp file in the same directory, then rename over `path`.
fn write_atomic(dir: &Path, path: &Path, body: &[u8]) -> Result<(), CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductRecord;
    use crate::storage::MemoryStore;

    fn stored(id: &str) -> StoredRecord<ProductRecord> {
        let record: ProductRecord = serde_json::from_value(serde_json::json!({
            "product_id": id,
            "product_url": format!("https://www.musinsa.com/products/{}", id),
        }))
        .unwrap();
        StoredRecord {
            record,
            json_path: format!("json/women_etc/{}.json", id),
            img_paths: vec![format!("images/women_etc/{}/1.jpg", id)],
        }
    }

    fn ids(list: &[&str]) -> Vec<ItemId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "data_0");
        let known = ids(&["3", "1", "2"]);
        let records = vec![stored("3"), stored("1")];

        store.save(&known, &records, false).await.unwrap();
        let loaded: Checkpoint<ProductRecord> = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.known_ids, known);
        assert_eq!(loaded.records, records);
        assert!(!loaded.complete);
        assert_eq!(loaded.run, "data_0");
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryStore::new();
        let store = CheckpointStore::new(dir.path(), "none").with_remote(Arc::new(remote), "files");
        let loaded: Option<Checkpoint<ProductRecord>> = store.load().await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_remote_mirror_used_when_local_missing() {
        let remote = MemoryStore::new();
        let first = tempfile::tempdir().unwrap();
        CheckpointStore::new(first.path(), "additional_05_01")
            .with_remote(Arc::new(remote.clone()), "files")
            .save(&ids(&["7"]), &[stored("7")], true)
            .await
            .unwrap();
        assert!(remote.object("files/additional_05_01.json").is_some());

        let second = tempfile::tempdir().unwrap();
        let restored: Checkpoint<ProductRecord> =
            CheckpointStore::new(second.path(), "additional_05_01")
                .with_remote(Arc::new(remote), "files")
                .load()
                .await
                .unwrap()
                .unwrap();
        assert!(restored.complete);
        assert_eq!(restored.known_ids, ids(&["7"]));
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "bad");
        std::fs::write(store.local_path(), b"{ not json").unwrap();
        let err = store.load::<ProductRecord>().await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_remote_outage_surfaces_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryStore::new();
        remote.fail_prefix("files/");
        let store = CheckpointStore::new(dir.path(), "run").with_remote(Arc::new(remote), "files");
        let err = store
            .save::<ProductRecord>(&ids(&["1"]), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Storage(_)));
        // The local copy still landed.
        assert!(store.local_path().exists());
    }

    #[tokio::test]
    async fn test_load_as_untyped_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "any");
        store.save(&ids(&["1"]), &[stored("1")], false).await.unwrap();
        let loaded: Checkpoint<serde_json::Value> = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].record["product_id"], "1");
    }

    #[tokio::test]
    async fn test_known_ids_shared_across_machines_through_mirror() {
        let remote = MemoryStore::new();
        let first = tempfile::tempdir().unwrap();
        KnownIdsStore::new(first.path(), "known_snap_ids")
            .with_remote(Arc::new(remote.clone()), "files/")
            .save(&ids(&["5", "9"]))
            .await
            .unwrap();
        assert!(remote.object("files/known_snap_ids.json").is_some());

        let second = tempfile::tempdir().unwrap();
        let store = KnownIdsStore::new(second.path(), "known_snap_ids")
            .with_remote(Arc::new(remote), "files");
        assert_eq!(store.remote_path(), "files/known_snap_ids.json");
        assert_eq!(store.load().await.unwrap(), ids(&["5", "9"]));
    }

    #[tokio::test]
    async fn test_known_ids_missing_is_empty_and_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnownIdsStore::new(dir.path(), "known_snap_ids");
        assert!(store.load().await.unwrap().is_empty());

        std::fs::write(store.local_path(), b"[1, 2").unwrap();
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }));
    }
}
