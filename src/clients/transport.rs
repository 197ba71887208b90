//! The resilient transport: retry, backoff and rate-limit compliance.
//!
//! [`ResilientTransport::execute`] owns the full attempt loop of one logical
//! request. Every retryable condition is handled here; callers only ever
//! see a successful response or a terminal [`HttpError`].
//!
//! # Retry Behavior
//!
//! - **2xx**: returned immediately
//! - **429**: waits exactly `Retry-After` (seconds or HTTP-date, clamped to
//!   `max_wait_time`), or falls back to exponential backoff
//! - **5xx / transport errors**: exponential backoff
//!   `min(max_wait_time, base_wait_time * 2^attempt)`
//! - **Other statuses**: returned immediately as [`TerminalClientFailure`]
//! - **Requests the HTTP stack cannot build**: returned immediately as
//!   [`InvalidHttpRequestError::Unsendable`]
//!
//! At most `max_retries + 1` attempts are made.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{field, Instrument};

use crate::clients::errors::{
    HttpError, InvalidHttpRequestError, RetryExhaustedError, TerminalClientFailure,
    TransportFailure,
};
use crate::clients::executor::RequestExecutor;
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;
use crate::clients::observer::Observers;
use crate::clients::rate_limit::RateLimitAdvisor;
use crate::clients::retry::{AttemptOutcome, BackoffPolicy, Jitter, RetryDecision, RetryState};
use crate::config::BaseUrl;
use crate::error::ConfigError;

/// Component name reported on request spans.
pub const COMPONENT: &str = "katana-api-rust";

/// Retry and timeout settings for the transport.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use katana_api::clients::TransportConfig;
///
/// let config = TransportConfig::builder()
///     .max_retries(3)
///     .base_wait_time(Duration::from_millis(500))
///     .max_wait_time(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries(), 3);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    max_retries: u32,
    base_wait_time: Duration,
    max_wait_time: Duration,
    timeout: Duration,
    jitter: Jitter,
}

impl TransportConfig {
    /// Default number of retries after the first attempt.
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    /// Default wait before the first retry.
    pub const DEFAULT_BASE_WAIT: Duration = Duration::from_secs(1);
    /// Default cap on any single wait.
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
    /// Default per-attempt timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    /// Retries allowed after the first attempt; 0 disables retrying.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wait before the first retry.
    #[must_use]
    pub const fn base_wait_time(&self) -> Duration {
        self.base_wait_time
    }

    /// Upper bound on any single wait.
    #[must_use]
    pub const fn max_wait_time(&self) -> Duration {
        self.max_wait_time
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Jitter applied to backoff waits.
    #[must_use]
    pub const fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// The backoff policy these settings describe.
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.base_wait_time, self.max_wait_time, self.jitter)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_wait_time: Self::DEFAULT_BASE_WAIT,
            max_wait_time: Self::DEFAULT_MAX_WAIT,
            timeout: Self::DEFAULT_TIMEOUT,
            jitter: Jitter::None,
        }
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    max_retries: Option<u32>,
    base_wait_time: Option<Duration>,
    max_wait_time: Option<Duration>,
    timeout: Option<Duration>,
    jitter: Option<Jitter>,
}

impl TransportConfigBuilder {
    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the wait before the first retry.
    #[must_use]
    pub const fn base_wait_time(mut self, wait: Duration) -> Self {
        self.base_wait_time = Some(wait);
        self
    }

    /// Sets the cap on any single wait.
    #[must_use]
    pub const fn max_wait_time(mut self, wait: Duration) -> Self {
        self.max_wait_time = Some(wait);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the backoff jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Builds the config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWaitBounds`] if the base wait exceeds the
    /// max wait, or [`ConfigError::InvalidValue`] for a zero timeout.
    pub fn build(self) -> Result<TransportConfig, ConfigError> {
        let defaults = TransportConfig::default();
        let base_wait_time = self.base_wait_time.unwrap_or(defaults.base_wait_time);
        let max_wait_time = self.max_wait_time.unwrap_or(defaults.max_wait_time);
        let timeout = self.timeout.unwrap_or(defaults.timeout);

        if base_wait_time > max_wait_time {
            return Err(ConfigError::InvalidWaitBounds {
                base_ms: base_wait_time.as_millis(),
                max_ms: max_wait_time.as_millis(),
            });
        }
        if timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(TransportConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_wait_time,
            max_wait_time,
            timeout,
            jitter: self.jitter.unwrap_or(defaults.jitter),
        })
    }
}

/// Executes requests with retries, backoff and rate-limit compliance.
///
/// The transport holds no per-request state: each call to
/// [`execute`](Self::execute) creates its own [`RetryState`], so one
/// transport can serve any number of concurrent requests.
pub struct ResilientTransport {
    executor: Arc<dyn RequestExecutor>,
    config: TransportConfig,
    backoff: BackoffPolicy,
    advisor: RateLimitAdvisor,
    observers: Observers,
    base_url: Option<BaseUrl>,
}

// Verify ResilientTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResilientTransport>();
};

impl ResilientTransport {
    /// Wraps `executor` with the retry policy described by `config`.
    #[must_use]
    pub fn new(executor: Arc<dyn RequestExecutor>, config: TransportConfig) -> Self {
        let backoff = config.backoff();
        Self {
            executor,
            config,
            backoff,
            advisor: RateLimitAdvisor::new(backoff),
            observers: Observers::default(),
            base_url: None,
        }
    }

    /// Replaces the registered observers.
    #[must_use]
    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    /// Sets the base URL that relative paths are reported against.
    #[must_use]
    pub fn with_base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Returns the full URL for `path`, or `path` itself if no base URL is set.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        self.base_url
            .as_ref()
            .map_or_else(|| path.to_string(), |base| base.join(path))
    }

    /// Returns the transport settings.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Executes one logical request.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidRequest`] if the request fails validation or
    ///   cannot be built (nothing is sent)
    /// - [`HttpError::TerminalClient`] on a non-retryable status (one attempt)
    /// - [`HttpError::RetryExhausted`] if 5xx/429 persists past `max_retries`
    /// - [`HttpError::Transport`] if the last permitted attempt got no response
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let progress = AtomicU32::new(0);
        self.execute_tracked(request, &progress).await
    }

    /// Executes one logical request, aborting promptly if `token` is cancelled.
    ///
    /// Cancellation interrupts an in-flight attempt or a backoff sleep and
    /// is reported once as [`HttpError::Cancelled`]; it is never retried.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus [`HttpError::Cancelled`].
    pub async fn execute_with_cancellation(
        &self,
        request: &HttpRequest,
        token: &CancellationToken,
    ) -> Result<HttpResponse, HttpError> {
        let started = Instant::now();
        let progress = AtomicU32::new(0);

        tokio::select! {
            biased;
            () = token.cancelled() => {
                let attempts = progress.load(Ordering::Relaxed);
                tracing::info!(attempts, path = %request.path, "request cancelled by caller");
                Err(HttpError::Cancelled {
                    attempts,
                    elapsed: started.elapsed(),
                })
            }
            result = self.execute_tracked(request, &progress) => result,
        }
    }

    async fn execute_tracked(
        &self,
        request: &HttpRequest,
        progress: &AtomicU32,
    ) -> Result<HttpResponse, HttpError> {
        request.verify()?;

        let span = tracing::info_span!(
            "katana_client.request",
            component = COMPONENT,
            span.kind = "client",
            http.method = %request.http_method,
            http.url = %self.url_for(&request.path),
            http.status_code = field::Empty,
            error = field::Empty,
            attempts = field::Empty,
        );

        self.run(request, progress).instrument(span).await
    }

    async fn run(
        &self,
        request: &HttpRequest,
        progress: &AtomicU32,
    ) -> Result<HttpResponse, HttpError> {
        let span = tracing::Span::current();
        let mut state = RetryState::new();

        loop {
            let attempt = state.attempts();
            progress.store(attempt, Ordering::Relaxed);
            span.record("attempts", attempt);

            let outcome = self.attempt(request, attempt).await;
            let decision = RetryDecision::classify(&outcome);

            match (decision, outcome) {
                (RetryDecision::Succeed, AttemptOutcome::Response(response)) => {
                    span.record("http.status_code", response.code);
                    if response.rate_limit.is_some_and(|limit| limit.is_exhausted()) {
                        tracing::warn!(
                            path = %request.path,
                            reset_after = ?response.rate_limit.and_then(|limit| limit.reset_after),
                            "rate limit budget exhausted"
                        );
                    }
                    tracing::debug!(
                        attempt,
                        status = response.code,
                        elapsed_ms = millis(state.elapsed()),
                        "request succeeded"
                    );
                    return Ok(response);
                }
                (RetryDecision::TerminalClientError, AttemptOutcome::Response(response)) => {
                    span.record("http.status_code", response.code);
                    span.record("error", true);
                    tracing::warn!(
                        attempt,
                        status = response.code,
                        elapsed_ms = millis(state.elapsed()),
                        "request rejected, not retrying"
                    );
                    return Err(Self::terminal_failure(response, &state).into());
                }
                (RetryDecision::TerminalClientError, AttemptOutcome::Transport(error)) => {
                    span.record("error", true);
                    tracing::warn!(
                        attempt,
                        error = %error,
                        "request cannot be sent, not retrying"
                    );
                    return Err(InvalidHttpRequestError::Unsendable {
                        reason: error.to_string(),
                    }
                    .into());
                }
                (decision, outcome) if state.attempt >= self.config.max_retries => {
                    span.record("error", true);
                    if let AttemptOutcome::Response(response) = &outcome {
                        span.record("http.status_code", response.code);
                    }
                    tracing::error!(
                        attempts = attempt,
                        reason = decision.reason(),
                        elapsed_ms = millis(state.elapsed()),
                        "retries exhausted"
                    );
                    return Err(Self::exhausted(outcome, &state));
                }
                (decision, outcome) => {
                    let wait = self.wait_for(decision, &outcome, state.attempt);
                    match &outcome {
                        AttemptOutcome::Response(response) => tracing::warn!(
                            attempt,
                            wait_ms = millis(wait),
                            reason = decision.reason(),
                            status = response.code,
                            elapsed_ms = millis(state.elapsed()),
                            "retrying request"
                        ),
                        AttemptOutcome::Transport(error) => tracing::warn!(
                            attempt,
                            wait_ms = millis(wait),
                            reason = decision.reason(),
                            error = %error,
                            elapsed_ms = millis(state.elapsed()),
                            "retrying request"
                        ),
                    }
                    state.last_outcome = Some(outcome);
                    tokio::time::sleep(wait).await;
                    state.advance(wait);
                }
            }
        }
    }

    async fn attempt(&self, request: &HttpRequest, attempt: u32) -> AttemptOutcome {
        self.observers.request(request, attempt);
        match self.executor.send(request).await {
            Ok(response) => {
                self.observers.response(request, &response, attempt);
                AttemptOutcome::Response(response)
            }
            Err(error) => {
                self.observers.transport_error(request, &error, attempt);
                AttemptOutcome::Transport(error)
            }
        }
    }

    fn wait_for(&self, decision: RetryDecision, outcome: &AttemptOutcome, attempt: u32) -> Duration {
        match (decision, outcome) {
            (RetryDecision::RetryableRateLimit, AttemptOutcome::Response(response)) => {
                self.advisor.wait_for(response.retry_after.as_ref(), attempt)
            }
            _ => self.backoff.delay(attempt),
        }
    }

    fn terminal_failure(response: HttpResponse, state: &RetryState) -> TerminalClientFailure {
        TerminalClientFailure {
            status: response.code,
            message: response.error_message(),
            error_reference: response.request_id().map(String::from),
            body: response.body,
            attempts: state.attempts(),
            elapsed: state.elapsed(),
        }
    }

    fn exhausted(outcome: AttemptOutcome, state: &RetryState) -> HttpError {
        match outcome {
            AttemptOutcome::Response(response) => RetryExhaustedError {
                status: response.code,
                message: response.error_message(),
                error_reference: response.request_id().map(String::from),
                body: response.body,
                attempts: state.attempts(),
                elapsed: state.elapsed(),
            }
            .into(),
            AttemptOutcome::Transport(source) => TransportFailure {
                source,
                attempts: state.attempts(),
                elapsed: state.elapsed(),
            }
            .into(),
        }
    }
}

impl std::fmt::Debug for ResilientTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientTransport")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
