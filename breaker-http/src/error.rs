//! HTTP adapter errors.

use circuit_breaker::{BreakerError, CallError};
use thiserror::Error;

/// Errors returned by [`HttpBreaker`](crate::HttpBreaker).
#[derive(Error, Debug)]
pub enum HttpError {
    /// The breaker refused the request; nothing was sent.
    #[error(transparent)]
    Rejected(#[from] BreakerError),

    /// The request was sent and failed (connect, timeout, body).
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request could not be built; the breaker was not consulted.
    #[error("invalid HTTP request: {0}")]
    Request(#[source] reqwest::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl HttpError {
    /// Whether the breaker refused the request.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Whether the request failed with a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }
}

impl From<CallError<reqwest::Error>> for HttpError {
    fn from(err: CallError<reqwest::Error>) -> Self {
        match err {
            CallError::Rejected(rejection) => Self::Rejected(rejection),
            CallError::Operation(err) => Self::Transport(err),
        }
    }
}

/// Result type for HTTP adapter operations.
pub type HttpResult<T> = Result<T, HttpError>;
