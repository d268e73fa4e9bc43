//! Property-based tests for `ObjectStore`.
//!
//! - Round-trip: bytes and content type read back equal what was written
//! - Empty uploads are always rejected
//! - Keys and URLs keep the public format

use std::sync::Arc;

use bytes::Bytes;
use gazeta_shared::DeploymentConfig;
use proptest::prelude::*;

use crate::backend::{BlobBackend, FsBackend, ObjectBackend};
use crate::cache::ObjectCache;
use crate::error::StorageError;
use crate::key::is_generated_key;
use crate::store::ObjectStore;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Store over the in-memory blob backend with a cold cache.
fn memory_store() -> ObjectStore {
    let backend: Arc<dyn ObjectBackend> = Arc::new(BlobBackend::memory().expect("memory"));
    ObjectStore::new(backend, ObjectCache::default(), &DeploymentConfig::default())
}

/// Store over a fresh uploads directory, the default provider.
fn local_store(rt: &tokio::runtime::Runtime, dir: &tempfile::TempDir) -> ObjectStore {
    let backend = rt.block_on(FsBackend::new(dir.path())).expect("fs");
    ObjectStore::new(Arc::new(backend), ObjectCache::default(), &DeploymentConfig::default())
}

/// Strategy for upload file names, with and without extensions.
fn filename() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,12}\\.(png|jpg|jpeg|gif|svg|pdf|webp)",
        "[a-zA-Z0-9_-]{1,16}",
        Just(String::new()),
    ]
}

/// Strategy for caller-declared MIME types.
fn declared_type() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("image/png".to_string())),
        Just(Some("image/jpeg".to_string())),
        Just(Some("application/octet-stream".to_string())),
        Just(Some("image/webp".to_string())),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reads through the cache return exactly what was written.
    #[test]
    fn prop_round_trip_through_cache(
        body in prop::collection::vec(any::<u8>(), 1..2048),
        name in filename(),
        declared in declared_type(),
    ) {
        let rt = runtime();
        let store = memory_store();
        let body = Bytes::from(body);

        let uploaded = rt
            .block_on(store.put(body.clone(), &name, declared.as_deref()))
            .expect("put");
        let object = rt.block_on(store.get(&uploaded.key)).expect("get");

        prop_assert_eq!(&object.bytes, &body);
        if let Some(declared) = &declared {
            prop_assert_eq!(&object.content_type, declared);
        }
    }

    /// Reads from a cold cache return what was written, content type included.
    #[test]
    fn prop_round_trip_through_backend(
        body in prop::collection::vec(any::<u8>(), 1..2048),
        name in filename(),
        declared in declared_type(),
    ) {
        let rt = runtime();
        let dir = tempfile::TempDir::new().expect("tempdir");
        let store = local_store(&rt, &dir);
        let body = Bytes::from(body);

        let uploaded = rt
            .block_on(store.put(body.clone(), &name, declared.as_deref()))
            .expect("put");
        let cached = store.cache().get(&uploaded.key).expect("write-through");
        store.cache().invalidate(&uploaded.key);

        let object = rt.block_on(store.get(&uploaded.key)).expect("get");
        prop_assert_eq!(&object.bytes, &body);
        prop_assert_eq!(&object.content_type, &cached.content_type);
        if let Some(declared) = &declared {
            prop_assert_eq!(&object.content_type, declared);
        }
    }

    /// Generated keys and URLs keep the public format.
    #[test]
    fn prop_key_and_url_format(name in filename()) {
        let rt = runtime();
        let store = memory_store();

        let uploaded = rt
            .block_on(store.put(Bytes::from_static(b"x"), &name, None))
            .expect("put");

        prop_assert!(is_generated_key(&uploaded.key), "bad key {}", uploaded.key);
        prop_assert!(uploaded.public_url.ends_with(&uploaded.key));
    }

    /// Empty input never produces a stored object.
    #[test]
    fn prop_empty_upload_rejected(name in filename(), declared in declared_type()) {
        let rt = runtime();
        let store = memory_store();

        let result = rt.block_on(store.put(Bytes::new(), &name, declared.as_deref()));
        prop_assert!(matches!(result, Err(StorageError::EmptyPayload(_))));
        prop_assert!(rt.block_on(store.list("uploads/", None, 10)).expect("list").objects.is_empty());
    }
}
