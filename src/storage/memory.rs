//! In-memory object store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ObjectStore, StorageError, StorageResult};

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
}

/// In-memory store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    /// Paths starting with any of these prefixes fail as an outage.
    failing_prefixes: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes under `prefix` fail with [`StorageError::Unavailable`].
    pub fn fail_prefix(&self, prefix: impl Into<String>) {
        if let Ok(mut prefixes) = self.failing_prefixes.lock() {
            prefixes.push(prefix.into());
        }
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(path).cloned()
    }

    /// Stored paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self, path: &str) -> StorageResult<()> {
        let prefixes = self
            .failing_prefixes
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?;
        if prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Err(StorageError::Unavailable(format!("write to {} refused", path)));
        }
        Ok(())
    }

    fn insert(&self, path: &str, object: StoredObject) -> StorageResult<()> {
        self.check_available(path)?;
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))?
            .insert(path.to_string(), object);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.insert(
            path,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                cache_control: None,
            },
        )
    }

    async fn put_cached(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<()> {
        self.insert(
            path,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                cache_control: Some(cache_control.to_string()),
            },
        )
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.object(path)
            .map(|o| o.bytes)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        let object = self
            .object(src)
            .ok_or_else(|| StorageError::NotFound(src.to_string()))?;
        self.insert(dst, object)
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
