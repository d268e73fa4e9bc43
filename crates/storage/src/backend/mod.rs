//! Storage transports.
//!
//! Every physical backend implements [`ObjectBackend`]; the active one is
//! chosen once at startup by [`build_backend`] and injected into the
//! [`ObjectStore`](crate::ObjectStore).

mod blob;
mod fs;
mod http;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gazeta_shared::{StorageConfig, StorageProvider};
use serde::Serialize;

pub use self::blob::BlobBackend;
pub use self::fs::FsBackend;
pub use self::http::HttpBackend;

use crate::error::StorageError;
use crate::payload::RawPayload;
use crate::url::PublicRoute;

/// `Cache-Control` value for publicly readable uploads (one year).
pub const PUBLIC_CACHE_CONTROL: &str = "public, max-age=31536000";

/// An object as read from a transport, before normalization.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    /// Payload in whatever shape the transport produced.
    pub payload: RawPayload,
    /// Content type recorded by the backend, if it keeps one.
    pub content_type: Option<String>,
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    /// Storage key.
    pub key: String,
    /// Size in bytes, when the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Whether `key` sorts after the listing cursor, if any.
pub(crate) fn is_after(key: &str, start_after: Option<&str>) -> bool {
    start_after.is_none_or(|cursor| key > cursor)
}

/// Capability set every storage transport offers.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Route the backend's objects are served through.
    fn route(&self) -> PublicRoute {
        PublicRoute::ObjectStorage
    }

    /// Write `bytes` under `key`.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Read the object stored under `key`.
    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError>;

    /// Delete the object stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List up to `limit` objects whose key starts with `prefix`, in key
    /// order, skipping every key up to and including `start_after`.
    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ObjectEntry>, StorageError>;
}

/// Build the backend selected by configuration.
///
/// # Errors
///
/// Returns an error if the provider cannot be initialized.
pub async fn build_backend(
    config: &StorageConfig,
) -> Result<Arc<dyn ObjectBackend>, StorageError> {
    let backend: Arc<dyn ObjectBackend> = match &config.provider {
        StorageProvider::LocalFs { root } => Arc::new(FsBackend::new(root).await?),
        StorageProvider::Http { endpoint, token } => {
            Arc::new(HttpBackend::new(endpoint, token.clone())?)
        }
        provider => Arc::new(BlobBackend::from_provider(provider)?),
    };

    tracing::info!(
        backend = backend.name(),
        provider = config.provider.name(),
        "Storage backend ready"
    );
    Ok(backend)
}
