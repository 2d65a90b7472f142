//! Counts cache errors.

use circuit_breaker::CounterError;
use thiserror::Error;

/// Errors raised by a [`CountsCache`](crate::CountsCache).
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache could not be reached or refused the operation.
    #[error("counts cache unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded or decoded.
    #[error("counts record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<CacheError> for CounterError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(msg) => Self::Unavailable(msg),
            CacheError::Serialization(err) => Self::Corrupt(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_error_mapping() {
        let err: CounterError = CacheError::unavailable("timeout").into();
        assert!(matches!(err, CounterError::Unavailable(ref msg) if msg == "timeout"));

        let decode = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err: CounterError = CacheError::from(decode).into();
        assert!(matches!(err, CounterError::Corrupt(_)));
    }
}
