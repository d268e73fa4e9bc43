//! Application configuration management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Platform variables honoured as overrides for the deployment section.
///
/// Hosting platforms inject these directly, so they are read without the
/// `GAZETA__` prefix. Each pair is `(environment variable, config key)`.
const PLATFORM_OVERRIDES: [(&str, &str); 4] = [
    ("SITE_DOMAIN", "deployment.custom_domain"),
    ("REPLIT_DOMAINS", "deployment.platform_domains"),
    ("REPL_SLUG", "deployment.repl_slug"),
    ("REPL_OWNER", "deployment.repl_owner"),
];

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// In-process object cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Remote image ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Deployment context used to build public URLs.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted body size for multipart uploads.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Storage provider configuration.
///
/// Exactly one provider is active per process; it is chosen at startup and
/// never mixed per object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Process memory (development and tests only)
    Memory,
    /// Local filesystem under a managed uploads directory
    LocalFs {
        /// Uploads directory.
        root: PathBuf,
    },
    /// CDN-style object API spoken over plain HTTP
    Http {
        /// Base URL objects are addressed under.
        endpoint: String,
        /// Optional bearer token.
        #[serde(default)]
        token: Option<String>,
    },
}

impl StorageProvider {
    /// Create S3-compatible provider (Cloudflare R2, Supabase, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create Azure Blob Storage provider.
    #[must_use]
    pub fn azure_blob(
        account: impl Into<String>,
        access_key: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self::AzureBlob {
            account: account.into(),
            access_key: access_key.into(),
            container: container.into(),
        }
    }

    /// Create local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Create HTTP object API provider.
    #[must_use]
    pub fn http(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Get the provider name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::Memory => "memory",
            Self::LocalFs { .. } => "local",
            Self::Http { .. } => "http",
        }
    }
}

impl Default for StorageProvider {
    fn default() -> Self {
        Self::local_fs("./uploads")
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage provider configuration.
    #[serde(default)]
    pub provider: StorageProvider,
    /// Timeout applied to every individual backend call.
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    30
}

impl StorageConfig {
    /// Create a storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            backend_timeout_secs: default_backend_timeout(),
        }
    }

    /// Set the per-call backend timeout.
    #[must_use]
    pub fn with_backend_timeout(mut self, secs: u64) -> Self {
        self.backend_timeout_secs = secs;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(StorageProvider::default())
    }
}

/// In-process object cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Byte budget shared by all cached objects.
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: u64,
    /// Optional time-to-live for each entry.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_cache_max_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_cache_max_bytes(),
            ttl_secs: None,
        }
    }
}

/// Remote image ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Overall download timeout in seconds.
    #[serde(default = "default_ingest_timeout")]
    pub timeout_secs: u64,
    /// Largest accepted image.
    #[serde(default = "default_ingest_max_bytes")]
    pub max_bytes: usize,
}

fn default_ingest_timeout() -> u64 {
    15
}

fn default_ingest_max_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ingest_timeout(),
            max_bytes: default_ingest_max_bytes(),
        }
    }
}

/// Deployment inputs for public URL resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// Explicit domain override (e.g. `https://news.example.com/`).
    #[serde(default)]
    pub custom_domain: Option<String>,
    /// Hosted-platform domain list, either a JSON array or a comma separated string.
    #[serde(default)]
    pub platform_domains: Option<String>,
    /// Legacy hosted-platform project slug.
    #[serde(default)]
    pub repl_slug: Option<String>,
    /// Legacy hosted-platform project owner.
    #[serde(default)]
    pub repl_owner: Option<String>,
    /// Domain used when the platform list is set but unusable.
    #[serde(default = "default_fallback_domain")]
    pub fallback_domain: String,
    /// Base URL used in local development.
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
}

fn default_fallback_domain() -> String {
    "replit.app".to_string()
}

fn default_local_base_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            custom_domain: None,
            platform_domains: None,
            repl_slug: None,
            repl_owner: None,
            fallback_domain: default_fallback_domain(),
            local_base_url: default_local_base_url(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("GAZETA").separator("__"));

        for (var, key) in PLATFORM_OVERRIDES {
            let value = std::env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        builder.build()?.try_deserialize()
    }
}
