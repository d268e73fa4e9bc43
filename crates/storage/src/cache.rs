//! In-process object cache using Moka.
//!
//! Every successful upload is written through to this cache, and reads check
//! it before touching the backend. Entries are weighted by their byte length
//! so the cache is bounded by a byte budget rather than an entry count.

use std::time::Duration;

use bytes::Bytes;
use gazeta_shared::CacheConfig;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

/// A cached object body with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedObject {
    /// Object bytes.
    pub bytes: Bytes,
    /// Content type recorded for the object.
    pub content_type: String,
}

/// Byte-budgeted cache of stored objects, keyed by storage key.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct ObjectCache {
    cache: Cache<String, CachedObject>,
}

impl ObjectCache {
    /// Creates a cache from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_config(config.max_bytes, config.ttl_secs.map(Duration::from_secs))
    }

    /// Creates a cache holding at most `max_bytes` of object data.
    ///
    /// Eviction is least-recently-used: a fresh insert always displaces the
    /// oldest entries once the budget is full.
    #[must_use]
    pub fn with_config(max_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(max_bytes)
            .eviction_policy(EvictionPolicy::lru())
            .weigher(|key: &String, value: &CachedObject| {
                let weight = key.len() + value.bytes.len() + value.content_type.len();
                u32::try_from(weight).unwrap_or(u32::MAX)
            });
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
        }
    }

    /// Stores an object, replacing any previous entry for the key.
    pub fn put(&self, key: impl Into<String>, bytes: Bytes, content_type: impl Into<String>) {
        self.cache.insert(
            key.into(),
            CachedObject {
                bytes,
                content_type: content_type.into(),
            },
        );
    }

    /// Returns the cached object, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CachedObject> {
        self.cache.get(key)
    }

    /// Returns whether the key is cached.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Drops the entry for a key.
    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(key);
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Total weight (approximate bytes) currently cached.
    #[must_use]
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Runs pending eviction and bookkeeping work.
    ///
    /// Moka does this lazily; tests call it to observe counts deterministically.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
