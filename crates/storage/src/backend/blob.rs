//! Remote blob backend using Apache OpenDAL.
//!
//! Objects are written with a one-year public `Cache-Control` and their
//! content type when the service records them. Reads resolve metadata first
//! and then fetch the body. Listings are streamed from the service and stop
//! after `limit` entries.

use async_trait::async_trait;
use bytes::Bytes;
use gazeta_shared::StorageProvider;
use futures::{StreamExt, TryStreamExt, future};
use opendal::{ErrorKind, Operator, services};

use super::{FetchedObject, ObjectBackend, ObjectEntry, PUBLIC_CACHE_CONTROL, is_after};
use crate::error::StorageError;
use crate::payload::RawPayload;

/// Cloud blob store (S3-compatible, Azure Blob) or in-process memory service.
#[derive(Debug, Clone)]
pub struct BlobBackend {
    operator: Operator,
}

impl BlobBackend {
    /// Create a backend from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not an OpenDAL service or cannot
    /// be initialized.
    pub fn from_provider(provider: &StorageProvider) -> Result<Self, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::Memory => Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish(),
            other => {
                return Err(StorageError::configuration(format!(
                    "provider '{}' is not served by OpenDAL",
                    other.name()
                )));
            }
        };

        Ok(Self::new(operator))
    }

    /// Wrap an existing operator.
    #[must_use]
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// In-process memory backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory service cannot be initialized.
    pub fn memory() -> Result<Self, StorageError> {
        Self::from_provider(&StorageProvider::Memory)
    }
}

#[async_trait]
impl ObjectBackend for BlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let capability = self.operator.info().full_capability();

        let mut write = self.operator.write_with(key, bytes);
        if capability.write_with_content_type {
            write = write.content_type(content_type);
        }
        if capability.write_with_cache_control {
            write = write.cache_control(PUBLIC_CACHE_CONTROL);
        }
        write.await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError> {
        let meta = self.operator.stat(key).await.map_err(|e| not_found_as_key(e, key))?;
        let buffer = self.operator.read(key).await.map_err(|e| not_found_as_key(e, key))?;

        Ok(FetchedObject {
            payload: RawPayload::Bytes(buffer.to_bytes()),
            content_type: meta.content_type().map(String::from),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        let capability = self.operator.info().full_capability();

        let mut lister = self.operator.lister_with(prefix).recursive(true);
        if let Some(cursor) = start_after.filter(|_| capability.list_with_start_after) {
            lister = lister.start_after(cursor);
        }

        // Services without `start_after` still list from the top; the filter
        // below skips what the cursor already covered.
        let entries = lister
            .await?
            .try_filter(|entry| {
                future::ready(entry.metadata().is_file() && is_after(entry.path(), start_after))
            })
            .take(limit)
            .map_ok(|entry| ObjectEntry {
                key: entry.path().to_string(),
                size: Some(entry.metadata().content_length()).filter(|len| *len > 0),
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(entries)
    }
}

fn not_found_as_key(err: opendal::Error, key: &str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::normalize;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let backend = BlobBackend::memory().expect("memory backend");
        backend
            .put("uploads/1-1.png", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .expect("put");

        let fetched = backend.get("uploads/1-1.png").await.expect("get");
        assert_eq!(
            normalize(fetched.payload).expect("bytes"),
            Bytes::from_static(b"\x89PNG")
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let backend = BlobBackend::memory().expect("memory backend");
        let err = backend.get("uploads/missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { key } if key == "uploads/missing.png"));
    }

    #[tokio::test]
    async fn test_list_by_prefix_with_limit() {
        let backend = BlobBackend::memory().expect("memory backend");
        for i in 0..5 {
            backend
                .put(&format!("uploads/{i}-0.jpg"), Bytes::from_static(b"x"), "image/jpeg")
                .await
                .expect("put");
        }
        backend
            .put("drafts/1-0.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await
            .expect("put");

        let all = backend.list("uploads/", None, 100).await.expect("list");
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|e| e.key.starts_with("uploads/")));

        let limited = backend.list("uploads/", None, 2).await.expect("list");
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_list_resumes_after_cursor() {
        let backend = BlobBackend::memory().expect("memory backend");
        for i in 0..5 {
            backend
                .put(&format!("uploads/{i}-0.jpg"), Bytes::from_static(b"x"), "image/jpeg")
                .await
                .expect("put");
        }

        let first = backend.list("uploads/", None, 2).await.expect("list");
        let keys: Vec<_> = first.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["uploads/0-0.jpg", "uploads/1-0.jpg"]);

        let rest = backend
            .list("uploads/", Some("uploads/1-0.jpg"), 10)
            .await
            .expect("list");
        let keys: Vec<_> = rest.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["uploads/2-0.jpg", "uploads/3-0.jpg", "uploads/4-0.jpg"]);
    }

    #[tokio::test]
    async fn test_declared_content_type_is_recorded() {
        let backend = BlobBackend::memory().expect("memory backend");
        backend
            .put("uploads/1-1.jpg", Bytes::from_static(b"RIFF"), "image/webp")
            .await
            .expect("put");

        let fetched = backend.get("uploads/1-1.jpg").await.expect("get");
        assert_eq!(fetched.content_type.as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = BlobBackend::memory().expect("memory backend");
        backend
            .put("uploads/1-1.gif", Bytes::from_static(b"GIF"), "image/gif")
            .await
            .expect("put");
        backend.delete("uploads/1-1.gif").await.expect("delete");
        assert!(backend.get("uploads/1-1.gif").await.is_err());
    }

    #[test]
    fn test_local_provider_is_rejected() {
        let err = BlobBackend::from_provider(&StorageProvider::local_fs("./x")).unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }
}
