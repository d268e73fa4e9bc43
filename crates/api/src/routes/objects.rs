//! Stored object routes.
//!
//! Objects are served under both public routes: `/api/object-storage/{key}`
//! with the full key, and `/api/files/{name}` with the `uploads/` prefix
//! dropped.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use gazeta_storage::backend::PUBLIC_CACHE_CONTROL;
use gazeta_storage::key::KEY_PREFIX;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError};

/// Default number of listed objects.
const DEFAULT_LIST_LIMIT: usize = 100;
/// Upper bound on listed objects per request.
const MAX_LIST_LIMIT: usize = 1000;

/// Creates the object routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/object-storage", get(list_objects))
        .route(
            "/api/object-storage/{*key}",
            get(get_object).delete(delete_object),
        )
        .route("/api/files/{name}", get(get_file))
}

/// Query parameters for listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Key prefix; defaults to `uploads/`.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Maximum entries; defaults to 100.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Cursor from a previous page; listing resumes after this key.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// A listed object with its public URL.
#[derive(Debug, Serialize)]
pub struct ListedFile {
    /// Storage key.
    pub key: String,
    /// Public URL.
    pub url: String,
    /// Size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Response for listing.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Listed objects.
    pub files: Vec<ListedFile>,
    /// Cursor for the next page, absent on the last one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

async fn serve(state: &AppState, key: &str) -> Result<Response, ApiError> {
    let object = state.store.get(key).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, PUBLIC_CACHE_CONTROL.to_string()),
        ],
        object.bytes,
    )
        .into_response())
}

/// GET `/api/object-storage/{*key}`
async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    serve(&state, &key).await
}

/// GET `/api/files/{name}`
async fn get_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    serve(&state, &format!("{KEY_PREFIX}{name}")).await
}

/// DELETE `/api/object-storage/{*key}`
async fn delete_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&key).await?;
    info!(key = %key, "Object deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/object-storage?prefix=&limit=&cursor=`
async fn list_objects(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let prefix = query.prefix.as_deref().unwrap_or(KEY_PREFIX);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let cursor = query.cursor.as_deref().filter(|c| !c.is_empty());

    let page = state.store.list(prefix, cursor, limit).await?;
    let files = page
        .objects
        .into_iter()
        .map(|entry| ListedFile {
            url: state.store.public_url(&entry.key),
            key: entry.key,
            size: entry.size,
        })
        .collect();

    Ok(Json(ListResponse {
        files,
        cursor: page.cursor,
    }))
}
