//! Local filesystem backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{FetchedObject, ObjectBackend, ObjectEntry, is_after};
use crate::error::StorageError;
use crate::key::KEY_PREFIX;
use crate::payload::RawPayload;
use crate::url::PublicRoute;

/// Stores objects as flat files in a managed uploads directory.
///
/// Key `uploads/<name>` lives at `<root>/<name>`. The content type recorded
/// at write time sits next to it in the hidden sidecar `<root>/.<name>.type`,
/// so cold reads return the declared type rather than a guess from the key.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create the backend, creating the uploads directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::configuration(format!(
                "cannot create uploads directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    /// The uploads directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let name = key.rsplit('/').next().unwrap_or_default();
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.starts_with('.')
            && !name.contains(['\\', '\0']);
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    path.with_file_name(format!(
        ".{}.{suffix}",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

/// Write `contents` to a temporary sibling and rename it over `path`.
async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let partial = sidecar_path(path, "partial");

    // Readers never observe a half-written file.
    fs::write(&partial, contents).await?;
    if let Err(err) = fs::rename(&partial, path).await {
        let _ = fs::remove_file(&partial).await;
        return Err(err.into());
    }
    Ok(())
}

async fn read_content_type(path: &Path) -> Option<String> {
    match fs::read_to_string(sidecar_path(path, "type")).await {
        Ok(content_type) => Some(content_type).filter(|ct| !ct.trim().is_empty()),
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "Content type unreadable");
            }
            None
        }
    }
}

#[async_trait]
impl ObjectBackend for FsBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn route(&self) -> PublicRoute {
        PublicRoute::Files
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        // The type goes first: a visible file always has its type beside it.
        write_atomically(&sidecar_path(&path, "type"), content_type.as_bytes()).await?;
        write_atomically(&path, &bytes).await?;
        tracing::debug!(path = %path.display(), "File written");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(FetchedObject {
                payload: RawPayload::from(bytes),
                content_type: read_content_type(&path).await,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                let _ = fs::remove_file(sidecar_path(&path, "type")).await;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key))
            }
            Err(err) => Err(err.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut entries = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let key = format!("{KEY_PREFIX}{name}");
            if key.starts_with(prefix) && is_after(&key, start_after) {
                entries.push(ObjectEntry {
                    key,
                    size: Some(meta.len()),
                });
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.truncate(limit);
        Ok(entries)
    }
}
