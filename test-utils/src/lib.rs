//! Shared test utilities for the circuit breaker crates.
//!
//! This crate provides:
//! - Proptest generators for outcomes and settings
//! - Mock listeners, caches and operations
//! - Test fixtures with sample settings and pre-tripped breakers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
