//! [`Counter`] backed by a [`CountsCache`].

use crate::cache::{CountsCache, StoredCounts};
use circuit_breaker::{Counter, CounterError, Counts};
use std::sync::Arc;
use tracing::warn;

/// Counter whose tallies live in a shared cache under the breaker's key.
///
/// Every mutation is a read-modify-write of the whole record. The breaker
/// serializes calls per instance; breakers in different processes sharing a
/// key may interleave, which only ever loses increments.
pub struct CachedCounter<K> {
    cache: Arc<K>,
    key: String,
}

impl<K: CountsCache> CachedCounter<K> {
    /// Create a counter stored under `key` (usually the breaker name).
    #[must_use]
    pub fn new(cache: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    /// Key the tallies are stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> Result<Counts, CounterError> {
        match self.cache.load(&self.key).await {
            Ok(record) => Ok(record.map(|r| r.counts).unwrap_or_default()),
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read breaker counts");
                Err(err.into())
            }
        }
    }

    async fn write(&self, counts: Counts) -> Result<(), CounterError> {
        self.cache
            .store(&self.key, StoredCounts::now(counts))
            .await
            .map_err(|err| {
                warn!(key = %self.key, error = %err, "failed to write breaker counts");
                err.into()
            })
    }

    async fn update(&self, apply: impl FnOnce(&mut Counts) + Send) -> Result<(), CounterError> {
        let mut counts = self.read().await?;
        apply(&mut counts);
        self.write(counts).await
    }
}

impl<K: CountsCache> Counter for CachedCounter<K> {
    async fn on_request(&mut self) -> Result<(), CounterError> {
        self.update(Counts::on_request).await
    }

    async fn on_success(&mut self) -> Result<(), CounterError> {
        self.update(Counts::on_success).await
    }

    async fn on_failure(&mut self) -> Result<(), CounterError> {
        self.update(Counts::on_failure).await
    }

    async fn clear(&mut self) -> Result<(), CounterError> {
        self.write(Counts::default()).await
    }

    async fn requests(&self) -> Result<u32, CounterError> {
        Ok(self.read().await?.requests)
    }

    async fn consecutive_failures(&self) -> Result<u32, CounterError> {
        Ok(self.read().await?.consecutive_failures)
    }

    async fn consecutive_successes(&self) -> Result<u32, CounterError> {
        Ok(self.read().await?.consecutive_successes)
    }

    async fn total_failures(&self) -> Result<u32, CounterError> {
        Ok(self.read().await?.total_failures)
    }

    async fn total_successes(&self) -> Result<u32, CounterError> {
        Ok(self.read().await?.total_successes)
    }

    async fn snapshot(&self) -> Result<Counts, CounterError> {
        self.read().await
    }
}
