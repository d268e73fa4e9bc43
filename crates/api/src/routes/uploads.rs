//! Upload routes.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use gazeta_shared::AppError;
use gazeta_storage::UploadResult;
use serde::Deserialize;
use tracing::info;

use crate::{AppState, error::ApiError};

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

/// Creates the upload routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/upload/remote", post(upload_remote))
}

/// Request body for ingesting a remote image.
#[derive(Debug, Deserialize)]
pub struct RemoteUploadRequest {
    /// Absolute HTTP(S) URL of the image.
    pub url: String,
}

/// POST `/api/upload`
/// Store the multipart `image` field; only `image/*` files are accepted.
async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResult>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation("Only image files are accepted".to_string()).into());
        }

        let bytes = field.bytes().await?;
        if bytes.len() > state.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Image exceeds {} bytes",
                state.max_upload_bytes
            ))
            .into());
        }

        let uploaded = state
            .store
            .put(bytes, &filename, Some(&content_type))
            .await?;
        info!(key = %uploaded.key, filename = %filename, "Image uploaded");
        return Ok(Json(uploaded));
    }

    Err(AppError::Validation("No file uploaded".to_string()).into())
}

/// POST `/api/upload/remote`
/// Download an image from a URL and store it.
async fn upload_remote(
    State(state): State<AppState>,
    Json(payload): Json<RemoteUploadRequest>,
) -> Result<Json<UploadResult>, ApiError> {
    let uploaded = state.ingestor.download_and_store(&payload.url).await?;
    info!(key = %uploaded.key, source = %payload.url, "Remote image stored");
    Ok(Json(uploaded))
}
