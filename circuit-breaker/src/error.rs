//! Error types surfaced by the circuit breaker.
//!
//! Admission rejections ([`BreakerError`]) are produced synchronously by the
//! breaker and never by the guarded operation. Operation errors are carried
//! through [`CallError::Operation`] untouched.

use thiserror::Error;

/// Reasons the breaker refuses to admit a call.
#[derive(Error, Debug)]
pub enum BreakerError {
    /// The breaker has tripped and is rejecting every call until its timeout
    /// elapses.
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Name of the breaker that rejected the call
        name: String,
    },

    /// The breaker is half-open and its probe budget is already in flight.
    #[error("too many requests: circuit breaker '{name}' is half-open")]
    TooManyRequests {
        /// Name of the breaker that rejected the call
        name: String,
    },

    /// The counter backend failed and the breaker is configured to fail closed.
    #[error("counter for circuit breaker '{name}' is unavailable: {source}")]
    CounterUnavailable {
        /// Name of the breaker that rejected the call
        name: String,
        /// Underlying counter failure
        #[source]
        source: CounterError,
    },
}

impl BreakerError {
    /// Create an open-circuit rejection for the given breaker.
    #[must_use]
    pub fn open(name: impl Into<String>) -> Self {
        Self::Open { name: name.into() }
    }

    /// Create a probe-budget rejection for the given breaker.
    #[must_use]
    pub fn too_many_requests(name: impl Into<String>) -> Self {
        Self::TooManyRequests { name: name.into() }
    }

    /// Name of the breaker that produced this error.
    #[must_use]
    pub fn breaker_name(&self) -> &str {
        match self {
            Self::Open { name }
            | Self::TooManyRequests { name }
            | Self::CounterUnavailable { name, .. } => name,
        }
    }

    /// Whether the call was refused because of the breaker state
    /// (as opposed to a counter backend failure).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::TooManyRequests { .. })
    }
}

/// Errors reported by a [`Counter`](crate::Counter) backend.
#[derive(Error, Debug)]
pub enum CounterError {
    /// The backing store could not be reached or refused the operation.
    #[error("counter backend unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("counter record corrupt: {0}")]
    Corrupt(String),
}

impl CounterError {
    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a corrupt-record error with the given message.
    #[must_use]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Result of running an operation through
/// [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The breaker refused to run the operation.
    #[error(transparent)]
    Rejected(#[from] BreakerError),

    /// The operation ran and returned its own error.
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    /// Whether the breaker refused the call before running the operation.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The operation's own error, if the operation ran.
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }

    /// The breaker rejection, if the operation never ran.
    #[must_use]
    pub const fn rejection(&self) -> Option<&BreakerError> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Operation(_) => None,
        }
    }
}

/// Errors raised while loading [`BreakerSettings`](crate::BreakerSettings).
#[derive(Error, Debug)]
pub enum SettingsError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    Invalid {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },
}
