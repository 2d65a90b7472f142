//! Shared counters for circuit breakers.
//!
//! This crate provides:
//! - The [`CountsCache`] storage trait and its [`StoredCounts`] record
//! - [`LocalCountsCache`], an in-process namespaced cache with TTLs
//! - [`CachedCounter`], a [`circuit_breaker::Counter`] that keeps its tallies
//!   in a [`CountsCache`]
//!
//! ```
//! use breaker_store::{CachedCounter, LocalCountsCache};
//! use circuit_breaker::{BreakerConfig, CircuitBreaker};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let cache = Arc::new(LocalCountsCache::with_defaults());
//! let breaker = CircuitBreaker::with_counter(
//!     BreakerConfig::new("billing"),
//!     CachedCounter::new(cache, "billing"),
//! )
//! .await;
//! assert!(breaker.before_call().await.is_ok());
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod counter;
pub mod error;

pub use cache::{CountsCache, LocalCacheConfig, LocalCountsCache, StoredCounts};
pub use counter::CachedCounter;
pub use error::CacheError;
