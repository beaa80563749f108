use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::error::{Result, StoreError};

/// Byte-level persistence used by the encrypted store. One call reads or
/// writes the entire text content at `path`.
///
/// `load` returns `Ok(None)` only when nothing exists at `path`; every other
/// failure is an error. Blocking and async methods must agree.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Read the whole blob, or `None` when the file does not exist.
    fn load(&self, path: &Path) -> Result<Option<String>>;

    /// Replace the whole blob.
    fn persist(&self, path: &Path, contents: &str) -> Result<()>;

    async fn load_async(&self, path: &Path) -> Result<Option<String>>;

    async fn persist_async(&self, path: &Path, contents: &str) -> Result<()>;
}

/// In-memory backend for tests and smoke runs. Contents are whatever the
/// store handed over, so ciphertext stays ciphertext.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlobBackend {
    inner: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl InMemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents at `path`, for inspection in tests.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(path).cloned())
    }

    /// Overwrite `path` directly, bypassing the store (simulates corruption).
    pub fn insert_raw(&self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Result<()> {
        let mut map = self.lock(Path::new(""))?;
        map.insert(path.into(), contents.into());
        Ok(())
    }

    fn lock(
        &self,
        path: &Path,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, String>>> {
        self.inner
            .lock()
            .map_err(|err| StoreError::io(path, format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl BlobBackend for InMemoryBlobBackend {
    fn load(&self, path: &Path) -> Result<Option<String>> {
        let map = self.lock(path)?;
        Ok(map.get(path).cloned())
    }

    fn persist(&self, path: &Path, contents: &str) -> Result<()> {
        let mut map = self.lock(path)?;
        map.insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn load_async(&self, path: &Path) -> Result<Option<String>> {
        self.load(path)
    }

    async fn persist_async(&self, path: &Path, contents: &str) -> Result<()> {
        self.persist(path, contents)
    }
}
