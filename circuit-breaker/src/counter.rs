//! Per-generation outcome counting.
//!
//! The breaker talks to its tallies only through the [`Counter`] capability
//! trait, so the default [`MemoryCounter`] can be swapped for a shared or
//! persisted backend without touching the state machine.

use crate::error::CounterError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Snapshot of the tallies for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// Calls admitted in this generation
    pub requests: u32,
    /// Successful outcomes recorded
    pub total_successes: u32,
    /// Failed outcomes recorded
    pub total_failures: u32,
    /// Current run of successes (zero after any failure)
    pub consecutive_successes: u32,
    /// Current run of failures (zero after any success)
    pub consecutive_failures: u32,
}

impl Counts {
    /// Count one admitted request.
    pub const fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    /// Count a success and end the current failure run.
    pub const fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    /// Count a failure and end the current success run.
    pub const fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    /// Reset every tally to zero.
    pub const fn clear(&mut self) {
        *self = Self {
            requests: 0,
            total_successes: 0,
            total_failures: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
        };
    }

    /// Whether every tally is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.requests == 0
            && self.total_successes == 0
            && self.total_failures == 0
            && self.consecutive_successes == 0
            && self.consecutive_failures == 0
    }
}

/// Capability set the breaker needs from its tallies.
///
/// The breaker serializes every call under its own lock, so implementations
/// need not be internally synchronized. A shared backend must still return
/// its own writes on the next read: the breaker records a failure and
/// immediately reads the consecutive counts to decide whether to trip.
pub trait Counter: Send + Sync {
    /// Count one admitted request.
    fn on_request(&mut self) -> impl Future<Output = Result<(), CounterError>> + Send;

    /// Count a success.
    fn on_success(&mut self) -> impl Future<Output = Result<(), CounterError>> + Send;

    /// Count a failure.
    fn on_failure(&mut self) -> impl Future<Output = Result<(), CounterError>> + Send;

    /// Reset every tally to zero.
    fn clear(&mut self) -> impl Future<Output = Result<(), CounterError>> + Send;

    /// Calls admitted in this generation.
    fn requests(&self) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// Current run of failures.
    fn consecutive_failures(&self) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// Current run of successes.
    fn consecutive_successes(&self) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// Failures recorded in this generation.
    fn total_failures(&self) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// Successes recorded in this generation.
    fn total_successes(&self) -> impl Future<Output = Result<u32, CounterError>> + Send;

    /// Read all tallies at once.
    ///
    /// Backends that store the record as a unit should override this to
    /// avoid one round trip per field.
    fn snapshot(&self) -> impl Future<Output = Result<Counts, CounterError>> + Send {
        async move {
            Ok(Counts {
                requests: self.requests().await?,
                total_successes: self.total_successes().await?,
                total_failures: self.total_failures().await?,
                consecutive_successes: self.consecutive_successes().await?,
                consecutive_failures: self.consecutive_failures().await?,
            })
        }
    }
}

/// In-process counter. This is what [`CircuitBreaker::new`](crate::CircuitBreaker::new) uses.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounter {
    counts: Counts,
}

impl MemoryCounter {
    /// Create a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for MemoryCounter {
    async fn on_request(&mut self) -> Result<(), CounterError> {
        self.counts.on_request();
        Ok(())
    }

    async fn on_success(&mut self) -> Result<(), CounterError> {
        self.counts.on_success();
        Ok(())
    }

    async fn on_failure(&mut self) -> Result<(), CounterError> {
        self.counts.on_failure();
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), CounterError> {
        self.counts.clear();
        Ok(())
    }

    async fn requests(&self) -> Result<u32, CounterError> {
        Ok(self.counts.requests)
    }

    async fn consecutive_failures(&self) -> Result<u32, CounterError> {
        Ok(self.counts.consecutive_failures)
    }

    async fn consecutive_successes(&self) -> Result<u32, CounterError> {
        Ok(self.counts.consecutive_successes)
    }

    async fn total_failures(&self) -> Result<u32, CounterError> {
        Ok(self.counts.total_failures)
    }

    async fn total_successes(&self) -> Result<u32, CounterError> {
        Ok(self.counts.total_successes)
    }

    async fn snapshot(&self) -> Result<Counts, CounterError> {
        Ok(self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outcomes_reset_opposite_run() {
        let mut counter = MemoryCounter::new();

        counter.on_failure().await.unwrap();
        counter.on_failure().await.unwrap();
        assert_eq!(counter.consecutive_failures().await.unwrap(), 2);

        counter.on_success().await.unwrap();
        assert_eq!(counter.consecutive_failures().await.unwrap(), 0);
        assert_eq!(counter.consecutive_successes().await.unwrap(), 1);
        assert_eq!(counter.total_failures().await.unwrap(), 2);
        assert_eq!(counter.total_successes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let mut counter = MemoryCounter::new();
        counter.on_request().await.unwrap();
        counter.on_failure().await.unwrap();

        counter.clear().await.unwrap();
        let once = counter.snapshot().await.unwrap();
        counter.clear().await.unwrap();
        let twice = counter.snapshot().await.unwrap();

        assert!(once.is_zero());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_default_snapshot_reads_every_field() {
        struct FieldByField(Counts);

        impl Counter for FieldByField {
            async fn on_request(&mut self) -> Result<(), CounterError> {
                self.0.on_request();
                Ok(())
            }
            async fn on_success(&mut self) -> Result<(), CounterError> {
                self.0.on_success();
                Ok(())
            }
            async fn on_failure(&mut self) -> Result<(), CounterError> {
                self.0.on_failure();
                Ok(())
            }
            async fn clear(&mut self) -> Result<(), CounterError> {
                self.0.clear();
                Ok(())
            }
            async fn requests(&self) -> Result<u32, CounterError> {
                Ok(self.0.requests)
            }
            async fn consecutive_failures(&self) -> Result<u32, CounterError> {
                Ok(self.0.consecutive_failures)
            }
            async fn consecutive_successes(&self) -> Result<u32, CounterError> {
                Ok(self.0.consecutive_successes)
            }
            async fn total_failures(&self) -> Result<u32, CounterError> {
                Ok(self.0.total_failures)
            }
            async fn total_successes(&self) -> Result<u32, CounterError> {
                Ok(self.0.total_successes)
            }
        }

        let mut counter = FieldByField(Counts::default());
        counter.on_request().await.unwrap();
        counter.on_success().await.unwrap();
        counter.on_request().await.unwrap();
        counter.on_failure().await.unwrap();

        let counts = counter.snapshot().await.unwrap();
        assert_eq!(
            counts,
            Counts {
                requests: 2,
                total_successes: 1,
                total_failures: 1,
                consecutive_successes: 0,
                consecutive_failures: 1,
            }
        );
    }

    #[test]
    fn test_counts_saturate() {
        let mut counts = Counts {
            requests: u32::MAX,
            ..Counts::default()
        };
        counts.on_request();
        assert_eq!(counts.requests, u32::MAX);
    }
}
