//! Object store: the single contract callers use regardless of backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gazeta_shared::{AppConfig, CacheConfig, DeploymentConfig, StorageConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{ObjectBackend, ObjectEntry, build_backend};
use crate::cache::ObjectCache;
use crate::content_type::resolve_content_type;
use crate::error::StorageError;
use crate::key::KeyGenerator;
use crate::payload::normalize;
use crate::url::PublicUrlResolver;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Generated storage key.
    pub key: String,
    /// Externally reachable URL for the object.
    #[serde(rename = "url")]
    pub public_url: String,
}

/// An object read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Storage key.
    pub key: String,
    /// Object bytes; never empty.
    pub bytes: Bytes,
    /// Content type recorded at upload or inferred from the key.
    pub content_type: String,
}

impl StoredObject {
    /// Size of the object in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectPage {
    /// Listed objects, in key order.
    pub objects: Vec<ObjectEntry>,
    /// Pass back as `start_after` to read the next page; `None` on the last.
    pub cursor: Option<String>,
}

/// Storage front door: key generation, write-through caching, degraded
/// writes and URL construction on top of one injected backend.
pub struct ObjectStore {
    backend: Arc<dyn ObjectBackend>,
    cache: ObjectCache,
    keys: KeyGenerator,
    urls: PublicUrlResolver,
    backend_timeout: Duration,
}

impl ObjectStore {
    /// Default per-call backend timeout.
    pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a store on top of an already built backend.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ObjectBackend>,
        cache: ObjectCache,
        deployment: &DeploymentConfig,
    ) -> Self {
        let urls = PublicUrlResolver::from_config(deployment, backend.route());
        Self {
            backend,
            cache,
            keys: KeyGenerator::new(),
            urls,
            backend_timeout: Self::DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the timeout applied to each backend call.
    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Build the configured backend and wrap it in a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub async fn from_config(
        storage: &StorageConfig,
        cache: &CacheConfig,
        deployment: &DeploymentConfig,
    ) -> Result<Self, StorageError> {
        let backend = build_backend(storage).await?;
        let store = Self::new(backend, ObjectCache::new(cache), deployment)
            .with_backend_timeout(Duration::from_secs(storage.backend_timeout_secs));

        info!(
            backend = store.backend.name(),
            base_url = store.urls.context().base(),
            "Object store initialized"
        );
        Ok(store)
    }

    /// Build a store from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub async fn from_app_config(config: &AppConfig) -> Result<Self, StorageError> {
        Self::from_config(&config.storage, &config.cache, &config.deployment).await
    }

    /// Store `bytes` under a freshly generated key.
    ///
    /// If the backend write fails the object is kept in the cache only and
    /// the upload still succeeds; the failure is logged.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPayload` if `bytes` is empty.
    pub async fn put(
        &self,
        bytes: Bytes,
        original_filename: &str,
        declared_type: Option<&str>,
    ) -> Result<UploadResult, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::empty_payload(format!(
                "refusing to store empty upload '{original_filename}'"
            )));
        }

        let key = self.keys.generate(original_filename);
        let content_type = resolve_content_type(&key, declared_type);

        match self
            .with_timeout(self.backend.put(&key, bytes.clone(), &content_type))
            .await
        {
            Ok(()) => info!(
                key = %key,
                size = bytes.len(),
                content_type = %content_type,
                backend = self.backend.name(),
                "Object stored"
            ),
            Err(e) => warn!(
                key = %key,
                error = %e,
                backend = self.backend.name(),
                "Backend write failed; object kept in cache only"
            ),
        }

        self.cache.put(key.clone(), bytes, content_type);

        let public_url = self.urls.resolve(&key);
        Ok(UploadResult { key, public_url })
    }

    /// Read an object, serving from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent from the cache and the backend
    /// cannot produce a non-empty body for it.
    pub async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let key = key.trim_start_matches('/');

        if let Some(hit) = self.cache.get(key) {
            debug!(key = %key, "Cache hit");
            return Ok(StoredObject {
                key: key.to_string(),
                bytes: hit.bytes,
                content_type: hit.content_type,
            });
        }
        debug!(key = %key, "Cache miss");

        let fetched = self
            .with_timeout(self.backend.get(key))
            .await
            .map_err(|e| {
                debug!(key = %key, error = %e, "Backend read failed");
                StorageError::not_found(key)
            })?;

        let bytes = normalize(fetched.payload).map_err(|e| {
            warn!(key = %key, error = %e, "Backend payload could not be decoded");
            StorageError::not_found(key)
        })?;
        let content_type = resolve_content_type(key, fetched.content_type.as_deref());

        self.cache.put(key, bytes.clone(), content_type.clone());

        Ok(StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        })
    }

    /// Delete an object from the backend and the cache.
    ///
    /// # Errors
    ///
    /// Returns the backend error if deletion fails. The cache entry is
    /// dropped either way.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.trim_start_matches('/');
        self.cache.invalidate(key);
        self.with_timeout(self.backend.delete(key)).await?;
        info!(key = %key, backend = self.backend.name(), "Object deleted");
        Ok(())
    }

    /// List up to `limit` stored objects whose key starts with `prefix` and
    /// sorts after `start_after`.
    ///
    /// The page carries a cursor when more objects remain.
    ///
    /// # Errors
    ///
    /// Returns the backend error if listing fails.
    pub async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage, StorageError> {
        // One extra entry tells whether another page exists.
        let mut objects = self
            .with_timeout(self.backend.list(prefix, start_after, limit.saturating_add(1)))
            .await?;

        let cursor = if objects.len() > limit {
            objects.truncate(limit);
            objects.last().map(|entry| entry.key.clone())
        } else {
            None
        };
        Ok(ObjectPage { objects, cursor })
    }

    /// Public URL for a key.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        self.urls.resolve(key)
    }

    /// The read cache.
    #[must_use]
    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Name of the active backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.backend_timeout, operation)
            .await
            .map_err(|_| {
                StorageError::transport(format!(
                    "{} backend did not answer within {:?}",
                    self.backend.name(),
                    self.backend_timeout
                ))
            })?
    }
}
