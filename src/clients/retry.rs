//! Retry classification and exponential backoff.
//!
//! [`RetryDecision::classify`] maps each attempt's outcome onto one of five
//! classes; [`BackoffPolicy`] computes the wait before the next attempt.
//! [`RetryState`] is created fresh for every logical request and threaded
//! through the retry loop, so concurrent requests never share retry state.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::clients::errors::TransportError;
use crate::clients::http_response::HttpResponse;

/// The result of a single physical attempt.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    /// The server answered.
    Response(HttpResponse),
    /// No response was obtained.
    Transport(TransportError),
}

/// How the transport should react to an [`AttemptOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// 2xx: return the response to the caller.
    Succeed,
    /// 5xx: retry with backoff.
    RetryableServerError,
    /// 429: retry after the server's hint, or with backoff.
    RetryableRateLimit,
    /// Timeout, connection error or other transport failure: retry with backoff.
    RetryableTransportError,
    /// Any other status, or a request that could not be built: fail
    /// immediately, never retried.
    TerminalClientError,
}

impl RetryDecision {
    /// Classifies an attempt outcome.
    #[must_use]
    pub const fn classify(outcome: &AttemptOutcome) -> Self {
        match outcome {
            AttemptOutcome::Response(response) => Self::classify_status(response.code),
            AttemptOutcome::Transport(error) if error.is_retryable() => {
                Self::RetryableTransportError
            }
            AttemptOutcome::Transport(_) => Self::TerminalClientError,
        }
    }

    /// Classifies a status code.
    ///
    /// # Example
    ///
    /// ```rust
    /// use katana_api::clients::RetryDecision;
    ///
    /// assert_eq!(RetryDecision::classify_status(204), RetryDecision::Succeed);
    /// assert_eq!(RetryDecision::classify_status(429), RetryDecision::RetryableRateLimit);
    /// assert_eq!(RetryDecision::classify_status(503), RetryDecision::RetryableServerError);
    /// assert_eq!(RetryDecision::classify_status(404), RetryDecision::TerminalClientError);
    /// ```
    #[must_use]
    pub const fn classify_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Succeed,
            429 => Self::RetryableRateLimit,
            500..=599 => Self::RetryableServerError,
            _ => Self::TerminalClientError,
        }
    }

    /// Returns `true` for the three retryable classes.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RetryableServerError | Self::RetryableRateLimit | Self::RetryableTransportError
        )
    }

    /// A short label used in log records.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Succeed => "success",
            Self::RetryableServerError => "server_error",
            Self::RetryableRateLimit => "rate_limited",
            Self::RetryableTransportError => "transport_error",
            Self::TerminalClientError => "client_error",
        }
    }
}

/// Randomization applied on top of the exponential backoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Deterministic waits.
    #[default]
    None,
    /// Scale each wait by a random factor in `[1.0, 1.5]`, still capped at the max wait.
    Bounded,
}

/// Exponential backoff: `min(max_wait, base_wait * 2^attempt)`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use katana_api::clients::{BackoffPolicy, Jitter};
///
/// let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(10), Jitter::None);
/// assert_eq!(policy.delay(0), Duration::from_secs(1));
/// assert_eq!(policy.delay(2), Duration::from_secs(4));
/// assert_eq!(policy.delay(8), Duration::from_secs(10));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_wait: Duration,
    max_wait: Duration,
    jitter: Jitter,
}

impl BackoffPolicy {
    /// Creates a policy. `base_wait` is raised to `max_wait` if it exceeds it.
    #[must_use]
    pub fn new(base_wait: Duration, max_wait: Duration, jitter: Jitter) -> Self {
        Self {
            base_wait: base_wait.min(max_wait),
            max_wait,
            jitter,
        }
    }

    /// The upper bound on any computed wait.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// The wait before retry number `attempt` (0 for the first retry).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let wait = self.deterministic_delay(attempt);
        match self.jitter {
            Jitter::None => wait,
            Jitter::Bounded => {
                let factor = rand::thread_rng().gen_range(1.0..=1.5);
                wait.mul_f64(factor).min(self.max_wait)
            }
        }
    }

    /// The wait before retry number `attempt`, without jitter.
    #[must_use]
    pub fn deterministic_delay(&self, attempt: u32) -> Duration {
        // 2^31 * any non-zero base already overflows every sane max_wait.
        let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base_wait
            .checked_mul(multiplier)
            .map_or(self.max_wait, |wait| wait.min(self.max_wait))
    }
}

/// Per-logical-request retry bookkeeping.
#[derive(Debug)]
pub struct RetryState {
    /// Retries performed so far (0 while on the first attempt).
    pub attempt: u32,
    /// Total time spent sleeping between attempts.
    pub total_wait: Duration,
    /// The most recent outcome.
    pub last_outcome: Option<AttemptOutcome>,
    started: Instant,
}

impl RetryState {
    /// Starts tracking a new logical request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt: 0,
            total_wait: Duration::ZERO,
            last_outcome: None,
            started: Instant::now(),
        }
    }

    /// Attempts started so far, counting the current one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt + 1
    }

    /// Time since the logical request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Records a wait and moves on to the next attempt.
    pub fn advance(&mut self, wait: Duration) {
        self.total_wait += wait;
        self.attempt += 1;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}
