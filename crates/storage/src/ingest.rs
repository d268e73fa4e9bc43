//! Remote image ingestion.
//!
//! Downloads an image from an arbitrary HTTP(S) URL, validates it and stores
//! it through the [`ObjectStore`]. The configured timeout covers the whole
//! download; a download that expires or fails never reaches the store.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use gazeta_shared::IngestConfig;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use tracing::{info, warn};

use crate::content_type::extension_for_content_type;
use crate::error::StorageError;
use crate::store::{ObjectStore, UploadResult};

/// Browser-like `User-Agent`; some image hosts reject unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";

/// A validated download, not yet stored.
#[derive(Debug)]
struct Download {
    bytes: Bytes,
    content_type: String,
    filename: String,
}

/// Fetches remote images and persists them as stored objects.
pub struct ImageIngestor {
    client: Client,
    store: Arc<ObjectStore>,
    timeout: Duration,
    max_bytes: usize,
}

impl ImageIngestor {
    /// Create an ingestor writing into `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(store: Arc<ObjectStore>, config: &IngestConfig) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            store,
            timeout: Duration::from_secs(config.timeout_secs),
            max_bytes: config.max_bytes,
        })
    }

    /// Download the image at `url` and store it.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if `url` is not an absolute HTTP(S) URL
    /// - `Http` if the server answers with a non-2xx status
    /// - `UnsupportedContentType` if the response is not `image/*`
    /// - `PayloadTooLarge` if the body exceeds the configured cap
    /// - `EmptyPayload` if the body is empty
    /// - `DownloadTimeout` if the download does not finish in time
    #[tracing::instrument(skip(self))]
    pub async fn download_and_store(&self, url: &str) -> Result<UploadResult, StorageError> {
        let url = parse_remote_url(url)?;

        let download = tokio::time::timeout(self.timeout, self.fetch(url.clone()))
            .await
            .map_err(|_| {
                warn!(url = %url, timeout = ?self.timeout, "Remote image download timed out");
                StorageError::DownloadTimeout {
                    secs: self.timeout.as_secs(),
                }
            })??;

        info!(
            url = %url,
            size = download.bytes.len(),
            content_type = %download.content_type,
            "Remote image downloaded"
        );

        self.store
            .put(download.bytes, &download.filename, Some(&download.content_type))
            .await
    }

    async fn fetch(&self, url: Url) -> Result<Download, StorageError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(StorageError::unsupported_content_type(content_type));
        }

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(StorageError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if buffer.len() + chunk.len() > self.max_bytes {
                return Err(StorageError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(StorageError::empty_payload(format!(
                "remote image {url} has an empty body"
            )));
        }

        let filename = filename_for(&url, &content_type);
        Ok(Download {
            bytes: buffer.freeze(),
            content_type,
            filename,
        })
    }
}

fn parse_remote_url(raw: &str) -> Result<Url, StorageError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| StorageError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(StorageError::InvalidUrl(raw.to_string())),
    }
}

/// File name taken from the last URL path segment, or `image.<ext>` derived
/// from the content type when that segment carries no extension.
fn filename_for(url: &Url, content_type: &str) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| {
            name.rsplit_once('.')
                .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        })
        .map_or_else(
            || format!("image.{}", extension_for_content_type(content_type)),
            str::to_string,
        )
}
