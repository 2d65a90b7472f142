//! HTTP client guarded by a circuit breaker.
//!
//! This crate provides:
//! - [`HttpConfig`] and [`build_http_client`] for a pooled rustls client
//! - [`HttpBreaker`], which sends requests through a
//!   [`circuit_breaker::CircuitBreaker`]
//! - [`HttpError`], separating breaker rejections from transport failures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod config;
pub mod error;

pub use breaker::HttpBreaker;
pub use config::{HttpConfig, build_http_client};
pub use error::{HttpError, HttpResult};

pub use reqwest;
