//! Mock implementations for testing.

use breaker_store::{CacheError, CountsCache, LocalCountsCache, StoredCounts};
use circuit_breaker::{CircuitState, StateListener};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// One observed state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Breaker name
    pub name: String,
    /// State before the change
    pub from: CircuitState,
    /// State after the change
    pub to: CircuitState,
}

/// State listener that records every transition it sees.
///
/// Clones share the same log, so keep one and hand the other to the breaker.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    transitions: Arc<Mutex<Vec<Transition>>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All transitions seen so far.
    #[must_use]
    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Target states of all transitions seen so far.
    #[must_use]
    pub fn states(&self) -> Vec<CircuitState> {
        self.transitions().into_iter().map(|t| t.to).collect()
    }

    /// Number of transitions seen so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl StateListener for RecordingListener {
    fn on_state_change(&self, name: &str, from: CircuitState, to: CircuitState) {
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Transition {
                name: name.to_string(),
                from,
                to,
            });
    }
}

/// Counts cache that can be switched off to simulate an outage.
pub struct FlakyCountsCache {
    inner: LocalCountsCache,
    down: AtomicBool,
    failed_ops: AtomicU64,
}

impl FlakyCountsCache {
    /// Create a reachable cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: LocalCountsCache::with_defaults(),
            down: AtomicBool::new(false),
            failed_ops: AtomicU64::new(0),
        }
    }

    /// Make the cache unreachable.
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    /// Make the cache reachable again.
    pub fn recover(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    /// Number of operations refused while down.
    #[must_use]
    pub fn failed_ops(&self) -> u64 {
        self.failed_ops.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            self.failed_ops.fetch_add(1, Ordering::SeqCst);
            return Err(CacheError::unavailable("mock cache is down"));
        }
        Ok(())
    }
}

impl Default for FlakyCountsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CountsCache for FlakyCountsCache {
    async fn load(&self, key: &str) -> Result<Option<StoredCounts>, CacheError> {
        self.check()?;
        self.inner.load(key).await
    }

    async fn store(&self, key: &str, record: StoredCounts) -> Result<(), CacheError> {
        self.check()?;
        self.inner.store(key, record).await
    }
}

/// Error returned by a [`ScriptedOperation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("scripted failure #{0}")]
pub struct ScriptedFailure(pub u64);

/// Operation that succeeds or fails following a script.
///
/// Once the script runs out every call succeeds.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperation {
    script: Arc<Mutex<VecDeque<bool>>>,
    calls: Arc<AtomicU64>,
}

impl ScriptedOperation {
    /// Create an operation following `outcomes` (`true` is success).
    #[must_use]
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the next scripted step.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptedFailure`] when the script says so.
    pub async fn run(&self) -> Result<u64, ScriptedFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let success = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(true);
        tokio::task::yield_now().await;

        if success {
            Ok(call)
        } else {
            Err(ScriptedFailure(call))
        }
    }

    /// Number of times the operation actually ran.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuit_breaker::Counts;

    #[test]
    fn test_recording_listener_shares_log() {
        let listener = RecordingListener::new();
        let handle = listener.clone();

        listener.on_state_change("db", CircuitState::Closed, CircuitState::Open);

        assert_eq!(handle.count(), 1);
        assert_eq!(handle.states(), vec![CircuitState::Open]);
        assert_eq!(handle.transitions()[0].name, "db");
    }

    #[tokio::test]
    async fn test_flaky_cache_outage() {
        let cache = FlakyCountsCache::new();
        let record = StoredCounts::now(Counts::default());
        cache.store("key", record).await.unwrap();

        cache.go_down();
        assert!(cache.load("key").await.is_err());
        assert!(cache.store("key", record).await.is_err());
        assert_eq!(cache.failed_ops(), 2);

        cache.recover();
        assert_eq!(cache.load("key").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_scripted_operation() {
        let op = ScriptedOperation::new([false, true]);

        assert_eq!(op.run().await, Err(ScriptedFailure(1)));
        assert_eq!(op.run().await, Ok(2));
        assert_eq!(op.run().await, Ok(3));
        assert_eq!(op.calls(), 3);
    }
}
