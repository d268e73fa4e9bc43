//! Helpers for route tests.

use std::sync::Arc;

use axum::response::Response;
use gazeta_shared::{DeploymentConfig, IngestConfig};
use gazeta_storage::{BlobBackend, ImageIngestor, ObjectCache, ObjectStore};
use http_body_util::BodyExt;

use crate::AppState;

const BOUNDARY: &str = "gazeta-test-boundary";

/// State over an in-memory backend with a 1 KiB upload limit.
pub fn memory_state() -> AppState {
    let store = Arc::new(ObjectStore::new(
        Arc::new(BlobBackend::memory().unwrap()),
        ObjectCache::default(),
        &DeploymentConfig::default(),
    ));
    let ingestor = Arc::new(ImageIngestor::new(store.clone(), &IngestConfig::default()).unwrap());
    AppState {
        store,
        ingestor,
        max_upload_bytes: 1024,
    }
}

/// Multipart body with a single file field; returns the content type and body.
pub fn multipart_body(
    field: &str,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Collect a response body as JSON.
pub async fn read_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
