//! Storage error types.

use gazeta_shared::AppError;
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No bytes to store or return.
    #[error("empty payload: {0}")]
    EmptyPayload(String),

    /// Backend returned a payload shape that yields no bytes.
    #[error("cannot decode backend payload: {0}")]
    Decode(String),

    /// Object not found in storage.
    #[error("object not found: {key}")]
    NotFound {
        /// Storage key that was not found.
        key: String,
    },

    /// Remote URL is malformed or not HTTP(S).
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Remote resource is not an image.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType {
        /// The content type the remote server declared.
        content_type: String,
    },

    /// Remote server answered with a non-success status.
    #[error("remote server responded with HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },

    /// Download did not complete in time.
    #[error("download timed out after {secs}s")]
    DownloadTimeout {
        /// Configured timeout in seconds.
        secs: u64,
    },

    /// Remote resource exceeds the accepted size.
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Maximum accepted size.
        limit: usize,
    },

    /// Key does not address an object inside the managed namespace.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Operation not offered by the active backend.
    #[error("operation not supported by storage backend: {0}")]
    Unsupported(String),

    /// Backend transport failed.
    #[error("storage transport failed: {0}")]
    Transport(String),
}

impl StorageError {
    /// Create an empty payload error.
    #[must_use]
    pub fn empty_payload(msg: impl Into<String>) -> Self {
        Self::EmptyPayload(msg.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an unsupported content type error.
    #[must_use]
    pub fn unsupported_content_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a transport error.
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Returns the HTTP status code callers should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::EmptyPayload(_)
            | Self::InvalidUrl(_)
            | Self::InvalidKey(_)
            | Self::UnsupportedContentType { .. } => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::NotFound { .. } => 404,
            Self::Decode(_) | Self::Http { .. } | Self::Transport(_) => 502,
            Self::DownloadTimeout { .. } => 504,
            Self::Unsupported(_) => 501,
            Self::Configuration(_) => 500,
        }
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            opendal::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            opendal::ErrorKind::ConfigInvalid => Self::Configuration(err.to_string()),
            _ => Self::Transport(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NotFound { .. } => Self::NotFound(message),
            StorageError::EmptyPayload(_)
            | StorageError::InvalidUrl(_)
            | StorageError::InvalidKey(_)
            | StorageError::UnsupportedContentType { .. } => Self::Validation(message),
            StorageError::PayloadTooLarge { .. } => Self::PayloadTooLarge(message),
            StorageError::Decode(_) | StorageError::Http { .. } | StorageError::Transport(_) => {
                Self::Upstream(message)
            }
            StorageError::DownloadTimeout { .. } => Self::UpstreamTimeout(message),
            StorageError::Unsupported(_) => Self::NotImplemented(message),
            StorageError::Configuration(_) => Self::Internal(message),
        }
    }
}
