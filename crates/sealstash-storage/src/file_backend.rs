use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use sealstash_core::{storage::BlobBackend, Result, StoreError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Filesystem backend. Writes go through a temp file in the target directory
/// followed by a rename, so readers see either the old or the new blob.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileBackend;

impl FileBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlobBackend for FileBackend {
    fn load(&self, path: &Path) -> Result<Option<String>> {
        match fs::read(path) {
            Ok(bytes) => blob_text(path, bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    fn persist(&self, path: &Path, contents: &str) -> Result<()> {
        write_atomic(path, contents.as_bytes())?;
        debug!(path = %path.display(), bytes = contents.len(), "persisted blob");
        Ok(())
    }

    async fn load_async(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => blob_text(path, bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }

    async fn persist_async(&self, path: &Path, contents: &str) -> Result<()> {
        let target: PathBuf = path.to_path_buf();
        let bytes = contents.as_bytes().to_vec();
        let len = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|e| StoreError::io(path, format!("write task failed: {e}")))??;
        debug!(path = %path.display(), bytes = len, "persisted blob");
        Ok(())
    }
}

/// The blob is text; bytes that are not UTF-8 mean the file is corrupt.
fn blob_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    let contents = String::from_utf8(bytes).map_err(|e| StoreError::Decode {
        reason: format!("{} is not valid UTF-8: {e}", path.display()),
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "loaded blob");
    Ok(contents)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(StoreError::io(path, "invalid storage path"));
        }
    };
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
    tmp.flush().map_err(|e| StoreError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
