//! Public URL resolution for stored objects.
//!
//! The base URL is resolved once from [`DeploymentConfig`] when the store is
//! built. Priority: explicit custom domain, hosted-platform domain list,
//! legacy `slug.owner.repl.co` host, local development base URL.

use gazeta_shared::DeploymentConfig;
use serde::Serialize;

use crate::key::KEY_PREFIX;

/// Route prefix for objects served out of a remote backend.
pub const OBJECT_STORAGE_ROUTE: &str = "/api/object-storage/";

/// Route prefix for objects served out of the local uploads directory.
pub const FILES_ROUTE: &str = "/api/files/";

/// The HTTP route a backend's objects are served through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicRoute {
    /// `/api/object-storage/{key}`.
    ObjectStorage,
    /// `/api/files/{file name}`; the `uploads/` prefix is dropped.
    Files,
}

/// Where the public base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseSource {
    /// Explicit custom domain override.
    CustomDomain,
    /// First entry of the hosted-platform domain list.
    PlatformDomain,
    /// Fallback used when the platform list held nothing usable.
    PlatformFallback,
    /// Legacy slug + owner host.
    LegacySlug,
    /// Local development base.
    Local,
}

/// Resolved deployment context: a base URL and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    base: String,
    source: BaseSource,
}

impl DeploymentContext {
    /// Resolve the deployment context following the priority chain.
    #[must_use]
    pub fn resolve(config: &DeploymentConfig) -> Self {
        if let Some(domain) = non_blank(config.custom_domain.as_deref()) {
            return Self::new(with_scheme(domain), BaseSource::CustomDomain);
        }

        if let Some(raw) = non_blank(config.platform_domains.as_deref()) {
            return match first_platform_domain(raw) {
                Some(domain) => Self::new(with_scheme(&domain), BaseSource::PlatformDomain),
                None => Self::new(
                    with_scheme(&config.fallback_domain),
                    BaseSource::PlatformFallback,
                ),
            };
        }

        if let (Some(slug), Some(owner)) = (
            non_blank(config.repl_slug.as_deref()),
            non_blank(config.repl_owner.as_deref()),
        ) {
            return Self::new(
                format!("https://{slug}.{owner}.repl.co"),
                BaseSource::LegacySlug,
            );
        }

        Self::new(config.local_base_url.clone(), BaseSource::Local)
    }

    fn new(base: String, source: BaseSource) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            source,
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Where the base URL came from.
    #[must_use]
    pub fn source(&self) -> BaseSource {
        self.source
    }
}

/// Builds externally reachable URLs for stored keys.
///
/// The base URL is fixed when the resolver is built; changes to the
/// deployment environment take effect after a restart.
#[derive(Debug, Clone)]
pub struct PublicUrlResolver {
    context: DeploymentContext,
    route: PublicRoute,
}

impl PublicUrlResolver {
    /// Creates a resolver for a deployment context and a backend route.
    #[must_use]
    pub fn new(context: DeploymentContext, route: PublicRoute) -> Self {
        Self { context, route }
    }

    /// Creates a resolver straight from deployment configuration.
    #[must_use]
    pub fn from_config(config: &DeploymentConfig, route: PublicRoute) -> Self {
        Self::new(DeploymentContext::resolve(config), route)
    }

    /// Public URL for a key. Never fails.
    #[must_use]
    pub fn resolve(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self.route {
            PublicRoute::ObjectStorage => {
                format!("{}{OBJECT_STORAGE_ROUTE}{key}", self.context.base())
            }
            PublicRoute::Files => {
                let name = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
                format!("{}{FILES_ROUTE}{name}", self.context.base())
            }
        }
    }

    /// The resolved deployment context.
    #[must_use]
    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// The route objects are served under.
    #[must_use]
    pub fn route(&self) -> PublicRoute {
        self.route
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn with_scheme(domain: &str) -> String {
    let domain = domain.trim();
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// First usable domain of a platform domain list.
///
/// Accepts a JSON array of strings (or a single JSON string), falling back to
/// a comma or whitespace separated list.
fn first_platform_domain(raw: &str) -> Option<String> {
    let parsed = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .find_map(|item| item.as_str().map(str::to_string)),
        Ok(serde_json::Value::String(s)) => Some(s),
        Ok(_) => None,
        Err(_) => raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|d| d.trim_matches(|c: char| c == '"' || c == '[' || c == ']'))
            .find(|d| !d.is_empty())
            .map(str::to_string),
    };

    parsed
        .map(|d| d.trim().trim_end_matches('/').to_string())
        .filter(|d| !d.is_empty())
}
