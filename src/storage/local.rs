//! Filesystem-backed object store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{ObjectStore, StorageError, StorageResult};

/// Stores each object as a file under `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path to a file, refusing anything that escapes the root.
    fn file_path(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                message: "path must be relative without '..'".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn io_error(path: &str, source: std::io::Error) -> StorageError {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let file = self.file_path(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: path.to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&file, bytes)
            .await
            .map_err(|source| StorageError::Io {
                path: path.to_string(),
                source,
            })
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        let file = self.file_path(path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| Self::io_error(path, e))
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        let bytes = self.get(src).await?;
        self.put(dst, bytes, "").await
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store
            .put("images/member/u1/9/1.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert!(dir.path().join("images/member/u1/9/1.jpg").exists());
        assert_eq!(store.get("images/member/u1/9/1.jpg").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.get("files/none.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!err.is_outage());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store.put("../evil", vec![], "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("a.json", b"[1]".to_vec(), "application/json").await.unwrap();
        store.copy("a.json", "backup/a.json").await.unwrap();
        assert_eq!(store.get("backup/a.json").await.unwrap(), b"[1]");
    }
}
