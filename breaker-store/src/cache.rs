//! Counts cache abstraction and an in-process implementation.
//!
//! A [`CountsCache`] stores one [`StoredCounts`] record per breaker key. Any
//! shared store (a remote cache, a database row) can implement it; the
//! [`LocalCountsCache`] keeps records in process with namespacing, TTLs and
//! bounded size.

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use circuit_breaker::Counts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted tallies for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCounts {
    /// The tallies themselves
    #[serde(flatten)]
    pub counts: Counts,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl StoredCounts {
    /// Stamp `counts` with the current time.
    #[must_use]
    pub fn now(counts: Counts) -> Self {
        Self {
            counts,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed storage for breaker tallies.
pub trait CountsCache: Send + Sync {
    /// Load the record for `key`, if any.
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<StoredCounts>, CacheError>> + Send;

    /// Replace the record for `key`.
    fn store(
        &self,
        key: &str,
        record: StoredCounts,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

impl<T: CountsCache> CountsCache for Arc<T> {
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<StoredCounts>, CacheError>> + Send {
        (**self).load(key)
    }

    fn store(
        &self,
        key: &str,
        record: StoredCounts,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).store(key, record)
    }
}

/// Local counts cache configuration.
#[derive(Debug, Clone)]
pub struct LocalCacheConfig {
    /// Namespace for key isolation
    pub namespace: String,
    /// Lifetime of a record after its last write
    pub ttl: Duration,
    /// Size above which expired records are evicted
    pub max_entries: usize,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            namespace: "circuit-breaker".to_string(),
            ttl: Duration::from_secs(3600),
            max_entries: 1000,
        }
    }
}

impl LocalCacheConfig {
    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the record TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the eviction threshold.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process [`CountsCache`].
///
/// Records are kept serialized, like a remote store would, so decoding
/// failures surface the same way.
pub struct LocalCountsCache {
    config: LocalCacheConfig,
    entries: RwLock<HashMap<String, Entry>>,
}

impl LocalCountsCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(config: LocalCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty cache with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LocalCacheConfig::default())
    }

    /// Namespace of this cache.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Number of stored records, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no records.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Store raw bytes under `key`, bypassing encoding.
    pub async fn store_raw(&self, key: &str, bytes: Vec<u8>) {
        let key = self.namespaced_key(key);
        let expires_at = Instant::now() + self.config.ttl;
        self.entries
            .write()
            .await
            .insert(key, Entry { bytes, expires_at });
    }

    fn namespaced_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.namespace, key)
    }
}

impl CountsCache for LocalCountsCache {
    async fn load(&self, key: &str) -> Result<Option<StoredCounts>, CacheError> {
        let key = self.namespaced_key(key);
        let entries = self.entries.read().await;

        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                Ok(Some(serde_json::from_slice(&entry.bytes)?))
            }
            Some(_) => {
                debug!(%key, "counts record expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, record: StoredCounts) -> Result<(), CacheError> {
        let key = self.namespaced_key(key);
        let bytes = serde_json::to_vec(&record)?;
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            Entry {
                bytes,
                expires_at: now + self.config.ttl,
            },
        );

        if entries.len() > self.config.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
        }

        Ok(())
    }
}
