//! HTTP client wrapped in a circuit breaker.

use crate::config::{HttpConfig, build_http_client};
use crate::error::{HttpError, HttpResult};
use circuit_breaker::{BreakerConfig, CircuitBreaker, Counter, MemoryCounter};
use reqwest::{Client, IntoUrl, Request, RequestBuilder, Response};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// HTTP client whose requests pass through a [`CircuitBreaker`].
///
/// Transport errors count as failures. HTTP error statuses are responses,
/// not failures, unless [`with_server_errors_as_failures`] is set; the
/// response is returned to the caller either way.
///
/// [`with_server_errors_as_failures`]: Self::with_server_errors_as_failures
pub struct HttpBreaker<C = MemoryCounter> {
    client: Client,
    breaker: Arc<CircuitBreaker<C>>,
    server_errors_are_failures: bool,
}

impl HttpBreaker {
    /// Build a client from `http` and a fresh in-memory breaker from `breaker`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Client`] if the HTTP client cannot be built.
    pub fn new(http: &HttpConfig, breaker: BreakerConfig) -> HttpResult<Self> {
        let client = build_http_client(http).map_err(HttpError::Client)?;
        Ok(Self::from_parts(client, Arc::new(CircuitBreaker::new(breaker))))
    }
}

impl<C: Counter> HttpBreaker<C> {
    /// Wrap an existing client and breaker.
    ///
    /// The breaker may be shared with other callers guarding the same
    /// dependency.
    #[must_use]
    pub const fn from_parts(client: Client, breaker: Arc<CircuitBreaker<C>>) -> Self {
        Self {
            client,
            breaker,
            server_errors_are_failures: false,
        }
    }

    /// Count 5xx responses as failures.
    #[must_use]
    pub const fn with_server_errors_as_failures(mut self) -> Self {
        self.server_errors_are_failures = true;
        self
    }

    /// The underlying HTTP client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// The breaker guarding this client.
    #[must_use]
    pub const fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    /// Start a GET request; pass it to [`send`](Self::send).
    pub fn get(&self, url: impl IntoUrl) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request; pass it to [`send`](Self::send).
    pub fn post(&self, url: impl IntoUrl) -> RequestBuilder {
        self.client.post(url)
    }

    /// Build and execute a request through the breaker.
    ///
    /// # Errors
    ///
    /// [`HttpError::Request`] if the request cannot be built (the breaker is
    /// not consulted), otherwise as [`execute`](Self::execute).
    #[instrument(skip(self, request), fields(breaker = %self.breaker.name()))]
    pub async fn send(&self, request: RequestBuilder) -> HttpResult<Response> {
        let request = request.build().map_err(HttpError::Request)?;
        self.execute(request).await
    }

    /// Execute a request through the breaker.
    ///
    /// # Errors
    ///
    /// [`HttpError::Rejected`] if the breaker refused the request, or
    /// [`HttpError::Transport`] if sending it failed.
    #[instrument(
        skip(self, request),
        fields(breaker = %self.breaker.name(), method = %request.method(), url = %request.url())
    )]
    pub async fn execute(&self, request: Request) -> HttpResult<Response> {
        let server_errors = self.server_errors_are_failures;
        let result = self
            .breaker
            .call_with(
                || self.client.execute(request),
                |result| match result {
                    Ok(response) if server_errors && response.status().is_server_error() => false,
                    other => self.breaker.classify(other),
                },
            )
            .await
            .map_err(HttpError::from);

        match &result {
            Ok(response) => debug!(status = %response.status(), "request completed"),
            Err(HttpError::Rejected(err)) => warn!(error = %err, "request rejected by breaker"),
            Err(err) => warn!(error = %err, "request failed"),
        }

        result
    }
}
