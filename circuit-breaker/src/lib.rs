//! Generation-based circuit breaker.
//!
//! A [`CircuitBreaker`] sits in front of a fallible, possibly slow operation.
//! It counts outcomes per *generation*, trips open once its
//! [`TripPolicy`] says so, rejects calls while open, and lets a limited number
//! of probe calls through once its timeout has elapsed.
//!
//! This crate provides:
//! - The three-state breaker with lazy, clock-driven transitions
//! - The [`Counter`] capability trait and the in-memory [`MemoryCounter`]
//! - Pluggable trip, success and state-change strategies
//! - A generic [`CircuitBreaker::call`] adapter that records panics as failures
//! - Declarative [`BreakerSettings`] and Prometheus-style [`BreakerMetrics`]
//! - `tracing` subscriber setup
//!
//! ```
//! use circuit_breaker::{BreakerConfig, CallError, CircuitBreaker};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreaker::new(
//!     BreakerConfig::new("inventory").with_timeout(Duration::from_secs(30)),
//! );
//!
//! let result = breaker
//!     .call(|| async { Ok::<_, std::io::Error>("in stock") })
//!     .await;
//! assert_eq!(result.unwrap(), "in stock");
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
mod call;
pub mod clock;
pub mod config;
pub mod counter;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod state;
pub mod tracing_config;

pub use breaker::CircuitBreaker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerConfig, BreakerSettings, CounterFailurePolicy};
pub use counter::{Counter, Counts, MemoryCounter};
pub use error::{BreakerError, CallError, CounterError, SettingsError};
pub use metrics::BreakerMetrics;
pub use policy::{
    ConsecutiveFailures, FailureRatio, NoError, StateListener, SuccessPolicy, TripPolicy,
};
pub use state::{CircuitState, Ticket};
pub use tracing_config::{TracingConfig, init_tracing};
