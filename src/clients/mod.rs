//! HTTP client types for Katana API communication.
//!
//! Every request goes through one seam: [`KatanaClient`] hands it to the
//! [`ResilientTransport`], which sends attempts through a [`RequestExecutor`]
//! and applies retry, backoff and `Retry-After` handling. Paginated listings
//! are driven by the [`PageAggregator`] on top of the same transport.
//!
//! # Overview
//!
//! - [`KatanaClient`]: Lifecycle shell owning the connection pool
//! - [`ResilientTransport`]: Retry loop for one logical request
//! - [`PageAggregator`]: Sequential multi-page aggregation
//! - [`RetryDecision`], [`BackoffPolicy`], [`RateLimitAdvisor`]: Retry policy pieces
//! - [`HttpRequest`] / [`HttpResponse`]: Request and parsed response
//! - [`HttpError`]: Every way a request can fail
//!
//! # Example
//!
//! ```rust,no_run
//! use katana_api::{ApiKey, KatanaClient, KatanaConfig};
//! use katana_api::clients::{HttpMethod, HttpRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KatanaConfig::builder()
//!     .api_key(ApiKey::new("your-api-key")?)
//!     .build()?;
//!
//! let client = KatanaClient::new(config);
//! client.open()?;
//!
//! let request = HttpRequest::builder(HttpMethod::Get, "sales_orders/42").build()?;
//! let response = client.request(request).await?;
//! println!("{}", response.body);
//!
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Retry Behavior
//!
//! - **429 (Rate Limited)**: Waits for `Retry-After`, or backs off exponentially
//! - **5xx and transport errors**: Exponential backoff up to `max_wait_time`
//! - **Other statuses**: Returned immediately without retry
//!
//! At most `max_retries + 1` attempts are made (default 5 retries).

mod errors;
mod executor;
mod http_client;
mod http_request;
mod http_response;
mod observer;
mod pagination;
mod rate_limit;
mod retry;
mod transport;

pub use errors::{
    HttpError, InvalidHttpRequestError, PaginationLimitExceededError, RetryExhaustedError,
    TerminalClientFailure, TransportError, TransportFailure,
};
pub use executor::{ReqwestExecutor, RequestExecutor, CLIENT_VERSION};
pub use http_client::{ClientStatus, KatanaClient};
pub use http_request::{
    DataType, HttpMethod, HttpRequest, HttpRequestBuilder, QueryValue, LIMIT_PARAM,
    PAGE_INFO_PARAM, PAGE_PARAM,
};
pub use http_response::{HttpResponse, PaginationInfo};
pub use observer::{Observers, RequestObserver};
pub use pagination::{
    extract_items, request_for, PageAggregator, PageCursor, PageMeta, PaginationCursor,
};
pub use rate_limit::{RateLimitAdvisor, RateLimitStatus, RetryAfter};
pub use retry::{AttemptOutcome, BackoffPolicy, Jitter, RetryDecision, RetryState};
pub use transport::{ResilientTransport, TransportConfig, TransportConfigBuilder, COMPONENT};
