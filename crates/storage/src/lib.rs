//! Object storage for Gazeta uploads.
//!
//! [`ObjectStore`] is the entry point: it generates keys, writes through an
//! in-process [`ObjectCache`], degrades to cache-only storage when the
//! backend write fails and builds public URLs. The physical transport is an
//! [`ObjectBackend`] chosen once at startup:
//!
//! - [`BlobBackend`] - cloud blob stores through `OpenDAL` (S3, Azure Blob,
//!   memory)
//! - [`FsBackend`] - flat files in a local uploads directory
//! - [`HttpBackend`] - a CDN-style object API over HTTP
//!
//! [`ImageIngestor`] downloads remote images into the same store.

pub mod backend;
pub mod cache;
pub mod content_type;
pub mod error;
pub mod ingest;
pub mod key;
pub mod payload;
pub mod store;
pub mod url;

#[cfg(test)]
mod store_props;

pub use backend::{
    BlobBackend, FetchedObject, FsBackend, HttpBackend, ObjectBackend, ObjectEntry, build_backend,
};
pub use cache::{CachedObject, ObjectCache};
pub use content_type::{extension_for_content_type, resolve_content_type};
pub use error::StorageError;
pub use ingest::ImageIngestor;
pub use key::KeyGenerator;
pub use payload::{RawPayload, normalize};
pub use store::{ObjectPage, ObjectStore, StoredObject, UploadResult};
pub use url::{BaseSource, DeploymentContext, PublicRoute, PublicUrlResolver};
