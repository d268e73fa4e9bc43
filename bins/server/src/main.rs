//! Gazeta API Server
//!
//! Main entry point for the upload and object storage service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gazeta_api::{AppState, create_router};
use gazeta_shared::AppConfig;
use gazeta_storage::{ImageIngestor, ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gazeta=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let store = Arc::new(
        ObjectStore::from_app_config(&config)
            .await
            .context("Failed to initialize object storage")?,
    );
    let ingestor = Arc::new(
        ImageIngestor::new(store.clone(), &config.ingest)
            .context("Failed to initialize image ingestion")?,
    );
    info!(
        backend = store.backend_name(),
        public_base = %store.public_url(""),
        cache_max_bytes = config.cache.max_bytes,
        ingest_timeout_secs = config.ingest.timeout_secs,
        "Storage configured"
    );

    let state = AppState {
        store,
        ingestor,
        max_upload_bytes: config.server.max_upload_bytes,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
