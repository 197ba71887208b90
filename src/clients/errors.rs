//! HTTP-specific error types for the Katana API client.
//!
//! Only terminal outcomes cross the transport boundary: every retryable
//! condition (5xx, 429, transport failures) is handled inside
//! [`ResilientTransport`](crate::clients::ResilientTransport) and surfaces
//! here only once the retry budget is spent.
//!
//! - [`TerminalClientFailure`]: a 4xx (other than 429) the server will keep rejecting
//! - [`RetryExhaustedError`]: 5xx/429 responses persisting past `max_retries`
//! - [`TransportFailure`]: no response at all on the last permitted attempt
//! - [`PaginationLimitExceededError`]: the page safety cap tripped
//! - [`InvalidHttpRequestError`]: the request failed validation before sending
//! - [`HttpError`]: unified error type encompassing all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use katana_api::clients::HttpError;
//!
//! match client.request(request).await {
//!     Ok(response) => println!("Success: {}", response.body),
//!     Err(HttpError::TerminalClient(e)) => println!("Rejected with {}", e.status),
//!     Err(HttpError::RetryExhausted(e)) => println!("Overloaded after {} attempts", e.attempts),
//!     Err(HttpError::Transport(e)) => println!("Unreachable: {}", e.source),
//!     Err(other) => println!("{other}"),
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

/// A failure to obtain any response from the server.
///
/// These are the physical failures a [`RequestExecutor`](crate::clients::RequestExecutor)
/// reports. All of them are retryable except [`TransportError::Unsendable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or was reset.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport-level failure (broken body stream, protocol error).
    #[error("transport error: {0}")]
    Other(String),

    /// The request could not be built (invalid header value, malformed URL).
    /// Nothing was sent.
    #[error("request could not be built: {0}")]
    Unsendable(String),
}

impl TransportError {
    /// Returns `true` if another attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unsendable(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Unsendable(err.to_string())
        } else if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Error returned when the server rejects a request with a non-retryable status.
///
/// Produced for every 4xx status except 429, and for any other non-2xx
/// status that reaches the client. Exactly one attempt was made.
#[derive(Debug, Error, Clone)]
#[error("Request rejected with status {status}: {message}")]
pub struct TerminalClientFailure {
    /// The HTTP status code of the response.
    pub status: u16,
    /// The response body.
    pub body: serde_json::Value,
    /// A short, human-readable rendering of the body's error fields.
    pub message: String,
    /// Number of attempts made (always 1 unless an earlier attempt was retried).
    pub attempts: u32,
    /// Time spent on the logical request, including backoff.
    pub elapsed: Duration,
    /// Reference ID for error reporting (from `X-Request-Id`).
    pub error_reference: Option<String>,
}

/// Error returned when retryable responses persist past `max_retries`.
#[derive(Debug, Error, Clone)]
#[error("Exceeded maximum retry count after {attempts} attempts in {elapsed:?}. Last status {status}: {message}")]
pub struct RetryExhaustedError {
    /// The HTTP status code of the last response.
    pub status: u16,
    /// The body of the last response.
    pub body: serde_json::Value,
    /// A short, human-readable rendering of the last body's error fields.
    pub message: String,
    /// The number of attempts that were made.
    pub attempts: u32,
    /// Time spent on the logical request, including backoff.
    pub elapsed: Duration,
    /// Reference ID for error reporting (from `X-Request-Id`).
    pub error_reference: Option<String>,
}

/// Error returned when the last permitted attempt failed at the transport level.
#[derive(Debug, Error, Clone)]
#[error("Transport failure after {attempts} attempts in {elapsed:?}: {source}")]
pub struct TransportFailure {
    /// The transport error of the last attempt.
    pub source: TransportError,
    /// The number of attempts that were made.
    pub attempts: u32,
    /// Time spent on the logical request, including backoff.
    pub elapsed: Duration,
}

/// Error returned when a paginated fetch reaches its page safety limit.
///
/// The pages that were fetched are not silently discarded: they are carried
/// in [`partial`](Self::partial) so that callers may opt in to using them.
#[derive(Debug, Error, Clone)]
#[error("Pagination safety limit of {limit} pages reached after {pages_fetched} pages with more pages remaining")]
pub struct PaginationLimitExceededError {
    /// The configured safety limit.
    pub limit: u32,
    /// The number of pages fetched before stopping.
    pub pages_fetched: u32,
    /// Items collected from the fetched pages, in server order.
    pub partial: Vec<serde_json::Value>,
}

/// Error returned when an HTTP request fails validation.
///
/// Raised before a request is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// A request body was provided without specifying the body type.
    #[error("Cannot set a body without also setting body_type.")]
    MissingBodyType,

    /// A POST, PUT or PATCH request was made without a body.
    #[error("Cannot use {method} without specifying data.")]
    MissingBody {
        /// The HTTP method that requires a body.
        method: String,
    },

    /// A pagination page size of zero was requested.
    #[error("Page size must be greater than zero.")]
    ZeroPageSize,

    /// The HTTP stack refused to build the request.
    #[error("Request cannot be sent: {reason}")]
    Unsendable {
        /// Why the request could not be built.
        reason: String,
    },
}

/// Unified error type for all HTTP-related errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The server rejected the request; it was not retried.
    #[error(transparent)]
    TerminalClient(#[from] TerminalClientFailure),

    /// Retryable responses persisted past the retry budget.
    #[error(transparent)]
    RetryExhausted(#[from] RetryExhaustedError),

    /// The server could not be reached on the last permitted attempt.
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// A paginated fetch reached its safety limit.
    #[error(transparent)]
    PaginationLimitExceeded(#[from] PaginationLimitExceededError),

    /// Request validation failed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// The caller cancelled the logical request.
    #[error("Request cancelled after {attempts} attempts in {elapsed:?}")]
    Cancelled {
        /// Attempts started before cancellation.
        attempts: u32,
        /// Time spent before cancellation.
        elapsed: Duration,
    },

    /// The client has not been opened yet.
    #[error("Client is not open. Call open() before sending requests.")]
    ClientNotOpen,

    /// The client has been closed.
    #[error("Client is closed. A closed client cannot send requests.")]
    ClientClosed,

    /// The underlying connection pool could not be created.
    #[error("Failed to create HTTP connection pool: {0}")]
    Setup(#[source] reqwest::Error),
}

impl HttpError {
    /// Returns the HTTP status code behind this error, if a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::TerminalClient(e) => Some(e.status),
            Self::RetryExhausted(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns the number of attempts made, when the error came from the transport loop.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::TerminalClient(e) => Some(e.attempts),
            Self::RetryExhausted(e) => Some(e.attempts),
            Self::Transport(e) => Some(e.attempts),
            Self::Cancelled { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
