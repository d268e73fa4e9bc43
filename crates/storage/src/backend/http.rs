//! CDN-style object API spoken over plain HTTP.
//!
//! Objects live at `{endpoint}/{key}` and are written with `PUT`, read with
//! `GET` and removed with `DELETE`. Listing is
//! `GET {endpoint}?prefix=&limit=&start_after=` answering
//! `{"objects": [{"key": ..., "size": ...}]}` in key order.
//!
//! Reads either return the raw body or a JSON document. JSON bodies may be
//! wrapped in a client result envelope (`{"ok": true, "value": ...}`, with an
//! optional `"contentType"` naming the stored type) and the value itself
//! comes in several historical shapes, so it is handed to
//! [`normalize`](crate::payload::normalize) as a [`RawPayload`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use super::{FetchedObject, ObjectBackend, ObjectEntry, PUBLIC_CACHE_CONTROL, is_after};
use crate::error::StorageError;
use crate::payload::RawPayload;

/// HTTP object API backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    objects: Vec<ListedObject>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    key: String,
    #[serde(default)]
    size: Option<u64>,
}

impl HttpBackend {
    /// Create a backend addressing objects under `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an HTTP(S) URL.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StorageError::configuration(format!("invalid endpoint {endpoint}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StorageError::configuration(format!(
                "endpoint must be http(s): {endpoint}"
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::configuration("endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(key.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let request = self
            .client
            .put(self.object_url(key)?)
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, PUBLIC_CACHE_CONTROL)
            .body(bytes);

        self.authorize(request).send().await?.error_for_status()?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<FetchedObject, StorageError> {
        let response = self
            .authorize(self.client.get(self.object_url(key)?))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(key));
        }
        let response = response.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
        {
            let value: Value = response.json().await?;
            return unwrap_envelope(value);
        }

        Ok(FetchedObject {
            payload: RawPayload::Bytes(response.bytes().await?),
            content_type,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .authorize(self.client.delete(self.object_url(key)?))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(key));
        }
        response.error_for_status()?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("prefix", prefix.to_string()), ("limit", limit.to_string())]);
        if let Some(cursor) = start_after {
            request = request.query(&[("start_after", cursor)]);
        }

        let listed: ListResponse = self
            .authorize(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(listed
            .objects
            .into_iter()
            .filter(|o| o.key.starts_with(prefix) && is_after(&o.key, start_after))
            .take(limit)
            .map(|o| ObjectEntry {
                key: o.key,
                size: o.size,
            })
            .collect())
    }
}

/// Strip a `{"ok": ..., "value": ...}` result envelope if present, keeping
/// the content type the envelope records.
fn unwrap_envelope(value: Value) -> Result<FetchedObject, StorageError> {
    match value {
        Value::Object(mut map) if map.contains_key("ok") && map.contains_key("value") => {
            if map.get("ok").and_then(Value::as_bool) == Some(false) {
                let reason = map
                    .remove("error")
                    .map_or_else(|| "unknown error".to_string(), |e| e.to_string());
                return Err(StorageError::transport(reason));
            }
            let content_type = map
                .get("contentType")
                .and_then(Value::as_str)
                .filter(|ct| !ct.trim().is_empty())
                .map(str::to_string);
            Ok(FetchedObject {
                payload: RawPayload::from(map.remove("value").unwrap_or(Value::Null)),
                content_type,
            })
        }
        other => Ok(FetchedObject {
            payload: RawPayload::from(other),
            content_type: None,
        }),
    }
}
