//! End-to-end tests for the circuit breaker crates live under `tests/`.

#![forbid(unsafe_code)]
