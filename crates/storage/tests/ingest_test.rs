//! Remote image ingestion against a local fixture server.
//!
//! Each test spins up an axum server on an ephemeral port serving the
//! responses a real image host might produce, then checks what ends up in
//! the store.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use gazeta_shared::{DeploymentConfig, IngestConfig};
use gazeta_storage::{BlobBackend, ImageIngestor, ObjectCache, ObjectStore, StorageError};
use tokio::net::TcpListener;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn image(content_type: &'static str, body: &'static [u8]) -> Response {
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

fn fixture_router() -> Router {
    Router::new()
        .route("/fotos/capa.png", get(|| async { image("image/png", PNG) }))
        .route("/render", get(|| async { image("image/webp", b"RIFF....WEBP") }))
        .route(
            "/pagina.png",
            get(|| async { image("text/html; charset=utf-8", b"<html></html>") }),
        )
        .route("/binario.png", get(|| async { PNG.to_vec() }))
        .route(
            "/ausente.png",
            get(|| async { StatusCode::NOT_FOUND.into_response() }),
        )
        .route(
            "/bloqueado.png",
            get(|| async { StatusCode::FORBIDDEN.into_response() }),
        )
        .route("/vazio.png", get(|| async { image("image/png", b"") }))
        .route(
            "/lento.png",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                image("image/png", PNG)
            }),
        )
        .route(
            "/gotejando.png",
            get(|| async {
                let chunks = futures::stream::unfold(0u8, |n| async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    (n < 50).then(|| (Ok::<_, std::io::Error>(Bytes::from_static(PNG)), n + 1))
                });
                ([(header::CONTENT_TYPE, "image/png")], Body::from_stream(chunks)).into_response()
            }),
        )
        .route(
            "/grande.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![7u8; 4096]).into_response() }),
        )
        .route(
            "/grande-stream.png",
            get(|| async {
                let chunks = futures::stream::iter(
                    (0..8).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![7u8; 512]))),
                );
                ([(header::CONTENT_TYPE, "image/png")], Body::from_stream(chunks)).into_response()
            }),
        )
}

async fn spawn_fixture_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, fixture_router()).await.unwrap();
    });
    addr
}

struct Harness {
    addr: SocketAddr,
    store: Arc<ObjectStore>,
    ingestor: ImageIngestor,
}

impl Harness {
    async fn new(config: IngestConfig) -> Self {
        let addr = spawn_fixture_server().await;
        let store = Arc::new(ObjectStore::new(
            Arc::new(BlobBackend::memory().unwrap()),
            ObjectCache::default(),
            &DeploymentConfig::default(),
        ));
        let ingestor = ImageIngestor::new(store.clone(), &config).unwrap();
        Self {
            addr,
            store,
            ingestor,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn ingest(&self, path: &str) -> Result<gazeta_storage::UploadResult, StorageError> {
        self.ingestor.download_and_store(&self.url(path)).await
    }

    async fn assert_nothing_stored(&self) {
        assert!(self.store.list("uploads/", None, 100).await.unwrap().objects.is_empty());
        self.store.cache().run_pending_tasks();
        assert_eq!(self.store.cache().entry_count(), 0);
    }
}

fn small_config() -> IngestConfig {
    IngestConfig {
        timeout_secs: 1,
        max_bytes: 1024,
    }
}

#[tokio::test]
async fn test_downloads_and_stores_image() {
    let harness = Harness::new(IngestConfig::default()).await;

    let uploaded = harness.ingest("/fotos/capa.png").await.unwrap();
    assert!(uploaded.key.starts_with("uploads/"));
    assert!(uploaded.key.ends_with(".png"));

    let object = harness.store.get(&uploaded.key).await.unwrap();
    assert_eq!(object.bytes, Bytes::from_static(PNG));
    assert_eq!(object.content_type, "image/png");
    assert_eq!(harness.store.list("uploads/", None, 10).await.unwrap().objects.len(), 1);
}

#[tokio::test]
async fn test_extension_comes_from_content_type_when_path_has_none() {
    let harness = Harness::new(IngestConfig::default()).await;
    let uploaded = harness.ingest("/render").await.unwrap();
    assert!(uploaded.key.ends_with(".webp"), "{}", uploaded.key);
}

#[tokio::test]
async fn test_non_image_is_rejected_without_put() {
    let harness = Harness::new(IngestConfig::default()).await;

    let err = harness.ingest("/pagina.png").await.unwrap_err();
    assert!(
        matches!(&err, StorageError::UnsupportedContentType { content_type } if content_type.starts_with("text/html")),
        "{err:?}"
    );
    assert_eq!(err.status_code(), 400);
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_non_image_binary_is_rejected() {
    let harness = Harness::new(IngestConfig::default()).await;
    let err = harness.ingest("/binario.png").await.unwrap_err();
    assert!(matches!(err, StorageError::UnsupportedContentType { .. }));
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let harness = Harness::new(IngestConfig::default()).await;

    let err = harness.ingest("/ausente.png").await.unwrap_err();
    assert!(matches!(err, StorageError::Http { status: 404 }));

    let err = harness.ingest("/bloqueado.png").await.unwrap_err();
    assert!(matches!(err, StorageError::Http { status: 403 }));
    assert_eq!(err.status_code(), 502);
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let harness = Harness::new(IngestConfig::default()).await;
    let err = harness.ingest("/vazio.png").await.unwrap_err();
    assert!(matches!(err, StorageError::EmptyPayload(_)));
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_slow_response_times_out_without_put() {
    let harness = Harness::new(small_config()).await;

    let err = harness.ingest("/lento.png").await.unwrap_err();
    assert!(matches!(err, StorageError::DownloadTimeout { secs: 1 }));
    assert_eq!(err.status_code(), 504);
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_stalled_body_times_out_without_partial_object() {
    let harness = Harness::new(IngestConfig {
        timeout_secs: 1,
        max_bytes: 1024 * 1024,
    })
    .await;

    let err = harness.ingest("/gotejando.png").await.unwrap_err();
    assert!(matches!(err, StorageError::DownloadTimeout { .. }));
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let harness = Harness::new(small_config()).await;

    for path in ["/grande.png", "/grande-stream.png"] {
        let err = harness.ingest(path).await.unwrap_err();
        assert!(
            matches!(err, StorageError::PayloadTooLarge { limit: 1024 }),
            "{path}: {err:?}"
        );
    }
    harness.assert_nothing_stored().await;
}

#[tokio::test]
async fn test_invalid_url_never_hits_network() {
    let harness = Harness::new(IngestConfig::default()).await;
    let err = harness
        .ingestor
        .download_and_store("ftp://example.com/a.png")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidUrl(_)));
    assert_eq!(err.status_code(), 400);
}
