//! Object storage capability.
//!
//! Paths are flat strings; directories exist only as a naming convention.

mod gcs;
mod local;
mod memory;

pub use gcs::GcsStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("object {path} rejected: {message}")]
    Rejected { path: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(String),
}

impl StorageError {
    /// Whether the backend as a whole is failing, as opposed to one object.
    pub fn is_outage(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::Io { .. } | StorageError::Http(_)
        )
    }
}

/// Flat-path object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Store with a `Cache-Control` value where the backend supports it.
    async fn put_cached(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        _cache_control: &str,
    ) -> StorageResult<()> {
        self.put(path, bytes, content_type).await
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>>;

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Storage backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Files under a local directory.
    #[default]
    Local,
    /// Google Cloud Storage bucket.
    Gcs,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "file" => Some(Self::Local),
            "gcs" | "gs" => Some(Self::Gcs),
            _ => None,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Bucket name (gcs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Root directory (local); defaults to `<data_dir>/objects`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// API endpoint override (gcs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token; only ever taken from the environment.
    #[serde(skip)]
    pub access_token: Option<String>,
}

/// Build the configured store.
pub fn create_store(config: &StorageConfig, objects_dir: &Path) -> StorageResult<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStore::new(objects_dir))),
        StorageBackend::Gcs => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::Unavailable("gcs backend requires a bucket".to_string())
            })?;
            let mut store = GcsStore::new(bucket, config.access_token.clone())?;
            if let Some(ref endpoint) = config.endpoint {
                store = store.with_endpoint(endpoint);
            }
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outage_classification() {
        assert!(StorageError::Unavailable("down".into()).is_outage());
        assert!(StorageError::Http("connect refused".into()).is_outage());
        assert!(!StorageError::NotFound("x".into()).is_outage());
        assert!(!StorageError::Rejected {
            path: "x".into(),
            message: "bad name".into()
        }
        .is_outage());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(StorageBackend::from_str("GCS"), Some(StorageBackend::Gcs));
        assert_eq!(StorageBackend::from_str("local"), Some(StorageBackend::Local));
        assert_eq!(StorageBackend::from_str("s3"), None);
    }

    #[test]
    fn test_gcs_requires_bucket() {
        let config = StorageConfig {
            backend: StorageBackend::Gcs,
            ..Default::default()
        };
        assert!(create_store(&config, Path::new("/tmp")).is_err());
    }
}
