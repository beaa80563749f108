use std::path::{Path, PathBuf};

use sealstash_core::{storage::BlobBackend, KeyMaterial, Result, StoreError, StoreMap};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, instrument};

use crate::{
    cipher::{Cipher, CipherMode},
    file_backend::FileBackend,
};

/// Name of the blob inside the store directory.
pub const DATA_FILE_NAME: &str = "data.encrypted";

/// Key-value store whose entire map is encrypted as one blob in one file.
///
/// Every operation reloads the map from the backend; nothing is cached
/// between calls. `set`, `delete` and `reset` rewrite the whole file.
///
/// Writes through one instance are serialized by an internal lock. Separate
/// instances (or processes) pointed at the same directory are not
/// coordinated: concurrent writers lose updates, last write wins on the whole
/// map.
///
/// Each operation has a blocking form and an `_async` form with the same
/// result. The blocking forms may be called from plain threads and from
/// inside a tokio runtime; on a runtime they block the calling worker for the
/// duration of the file I/O. On a current-thread runtime a blocking writer
/// cannot wait for an async writer that is parked on the same thread, so it
/// returns `StoreError::Io` instead of deadlocking.
pub struct EncryptedStore<B: BlobBackend = FileBackend> {
    path: PathBuf,
    cipher: Cipher,
    backend: B,
    write_lock: Mutex<()>,
}

impl EncryptedStore<FileBackend> {
    /// File-backed store in `directory` using the fixed-IV format.
    pub fn open(directory: impl AsRef<Path>, material: &KeyMaterial) -> Self {
        Self::with_backend(directory, Cipher::new(material), FileBackend)
    }

    pub fn open_with_mode(
        directory: impl AsRef<Path>,
        material: &KeyMaterial,
        mode: CipherMode,
    ) -> Self {
        Self::with_backend(
            directory,
            Cipher::new(material).with_mode(mode),
            FileBackend,
        )
    }
}

impl<B: BlobBackend> EncryptedStore<B> {
    pub fn with_backend(directory: impl AsRef<Path>, cipher: Cipher, backend: B) -> Self {
        Self {
            path: directory.as_ref().join(DATA_FILE_NAME),
            cipher,
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Full path of the encrypted blob.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The whole map, or `None` when no data has been written (missing or
    /// empty file). A present but unreadable file is a decode error.
    #[instrument(skip_all)]
    pub fn get_all(&self) -> Result<Option<StoreMap>> {
        let raw = self.backend.load(&self.path)?;
        self.decode_blob(raw)
    }

    #[instrument(skip_all)]
    pub async fn get_all_async(&self) -> Result<Option<StoreMap>> {
        let raw = self.backend.load_async(&self.path).await?;
        self.decode_blob(raw)
    }

    #[instrument(skip_all, fields(key = %key))]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        lookup(self.get_all()?, key)
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn get_async<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        lookup(self.get_all_async().await?, key)
    }

    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        self.get(key)
    }

    pub async fn get_value_async(&self, key: &str) -> Result<Option<Value>> {
        self.get_async(key).await
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self
            .get_all()?
            .is_some_and(|map| map.contains_key(key)))
    }

    pub async fn contains_key_async(&self, key: &str) -> Result<bool> {
        Ok(self
            .get_all_async()
            .await?
            .is_some_and(|map| map.contains_key(key)))
    }

    /// Sorted keys; empty when nothing is stored.
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.get_all()?.unwrap_or_default().into_keys().collect())
    }

    pub async fn keys_async(&self) -> Result<Vec<String>> {
        Ok(self
            .get_all_async()
            .await?
            .unwrap_or_default()
            .into_keys()
            .collect())
    }

    /// Insert or overwrite `key`, then rewrite the whole blob.
    #[instrument(skip_all, fields(key = %key))]
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(StoreError::encode)?;
        let _guard = self.lock_blocking()?;

        let mut map = self.get_all()?.unwrap_or_default();
        map.insert(key.to_string(), value);
        let blob = self.encode_blob(&map)?;
        self.backend.persist(&self.path, &blob)?;
        debug!(entries = map.len(), "stored key");
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn set_async<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(StoreError::encode)?;
        let _guard = self.write_lock.lock().await;

        let mut map = self.get_all_async().await?.unwrap_or_default();
        map.insert(key.to_string(), value);
        let blob = self.encode_blob(&map)?;
        self.backend.persist_async(&self.path, &blob).await?;
        debug!(entries = map.len(), "stored key");
        Ok(())
    }

    /// Remove `key`. No-op when nothing is stored; a missing key still
    /// rewrites the blob unchanged.
    #[instrument(skip_all, fields(key = %key))]
    pub fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock_blocking()?;

        let Some(mut map) = self.get_all()? else {
            debug!("nothing stored, delete skipped");
            return Ok(());
        };
        map.remove(key);
        let blob = self.encode_blob(&map)?;
        self.backend.persist(&self.path, &blob)?;
        debug!(entries = map.len(), "deleted key");
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    pub async fn delete_async(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let Some(mut map) = self.get_all_async().await? else {
            debug!("nothing stored, delete skipped");
            return Ok(());
        };
        map.remove(key);
        let blob = self.encode_blob(&map)?;
        self.backend.persist_async(&self.path, &blob).await?;
        debug!(entries = map.len(), "deleted key");
        Ok(())
    }

    /// Discard every key by writing an empty blob.
    #[instrument(skip_all)]
    pub fn reset(&self) -> Result<()> {
        let _guard = self.lock_blocking()?;
        self.backend.persist(&self.path, "")?;
        debug!("store reset");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_async(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.persist_async(&self.path, "").await?;
        debug!("store reset");
        Ok(())
    }

    fn lock_blocking(&self) -> Result<MutexGuard<'_, ()>> {
        if let Ok(guard) = self.write_lock.try_lock() {
            return Ok(guard);
        }
        match Handle::try_current() {
            Err(_) => Ok(self.write_lock.blocking_lock()),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| {
                    handle.block_on(self.write_lock.lock())
                }))
            }
            Ok(_) => Err(StoreError::io(
                &self.path,
                "write lock held by an async writer on this single-threaded runtime",
            )),
        }
    }

    fn encode_blob(&self, map: &StoreMap) -> Result<String> {
        self.cipher.encrypt(map)
    }

    fn decode_blob(&self, raw: Option<String>) -> Result<Option<StoreMap>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let text = unquote_legacy(&raw)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.cipher.decrypt(&text).map(Some)
    }
}

/// Older files hold the ciphertext as a JSON string literal; unwrap it.
fn unquote_legacy(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed).map_err(StoreError::decode)
    } else {
        Ok(trimmed.to_string())
    }
}

fn lookup<T: DeserializeOwned>(map: Option<StoreMap>, key: &str) -> Result<Option<T>> {
    let Some(value) = map.and_then(|mut map| map.remove(key)) else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| StoreError::Decode {
            reason: format!("value for {key} has unexpected shape: {e}"),
        })
}
