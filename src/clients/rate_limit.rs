//! Rate-limit signals and the wait they imply.
//!
//! A 429 response may carry a `Retry-After` header in either of the two
//! forms allowed by RFC 9110: a delay in seconds, or an HTTP-date. The
//! server's hint always takes precedence over exponential backoff; backoff
//! is only the fallback when the hint is missing or unparseable.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clients::retry::BackoffPolicy;

/// A parsed `Retry-After` header value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryAfter {
    /// Wait this long (`Retry-After: 120` or `Retry-After: 2.5`).
    Delay(Duration),
    /// Retry no earlier than this instant (`Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`).
    At(DateTime<Utc>),
}

impl RetryAfter {
    /// Parses a `Retry-After` header value.
    ///
    /// Accepts non-negative (possibly fractional) seconds or an RFC 2822 /
    /// IMF-fixdate timestamp. Returns `None` for anything else.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use katana_api::clients::RetryAfter;
    ///
    /// assert_eq!(RetryAfter::parse("2"), Some(RetryAfter::Delay(Duration::from_secs(2))));
    /// assert!(matches!(RetryAfter::parse("Wed, 21 Oct 2015 07:28:00 GMT"), Some(RetryAfter::At(_))));
    /// assert_eq!(RetryAfter::parse("soon"), None);
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(seconds) = value.parse::<f64>() {
            return Duration::try_from_secs_f64(seconds).ok().map(Self::Delay);
        }

        DateTime::parse_from_rfc2822(value)
            .ok()
            .map(|at| Self::At(at.with_timezone(&Utc)))
    }

    /// Returns the wait this hint implies at `now`. Dates in the past mean zero.
    #[must_use]
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Self::Delay(delay) => *delay,
            Self::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

/// Informational rate-limit budget from the `X-RateLimit-*` headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests allowed in the current window.
    pub limit: Option<u64>,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Seconds until the window resets, when reported.
    pub reset_after: Option<u64>,
}

impl RateLimitStatus {
    /// Builds the status from raw header values.
    ///
    /// `X-RateLimit-Remaining` is required; the other two are optional.
    #[must_use]
    pub fn from_headers(
        limit: Option<&str>,
        remaining: Option<&str>,
        reset: Option<&str>,
    ) -> Option<Self> {
        let remaining = remaining?.trim().parse().ok()?;
        Some(Self {
            limit: limit.and_then(|v| v.trim().parse().ok()),
            remaining,
            reset_after: reset.and_then(|v| v.trim().parse().ok()),
        })
    }

    /// Returns `true` when no requests remain in the current window.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Decides how long to wait after a rate-limited response.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitAdvisor {
    backoff: BackoffPolicy,
}

impl RateLimitAdvisor {
    /// Creates an advisor that falls back to `backoff` when no hint is usable.
    #[must_use]
    pub const fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }

    /// Returns the wait for a 429 on retry number `attempt` (0-based).
    ///
    /// A present hint is honored exactly, clamped to the policy's max wait,
    /// regardless of `attempt`.
    #[must_use]
    pub fn wait_for(&self, retry_after: Option<&RetryAfter>, attempt: u32) -> Duration {
        self.wait_for_at(retry_after, attempt, Utc::now())
    }

    /// Like [`wait_for`](Self::wait_for) with an explicit clock, for HTTP-date hints.
    #[must_use]
    pub fn wait_for_at(
        &self,
        retry_after: Option<&RetryAfter>,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Duration {
        retry_after.map_or_else(
            || self.backoff.delay(attempt),
            |hint| hint.delay_from(now).min(self.backoff.max_wait()),
        )
    }
}
