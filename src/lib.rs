//! # Katana API Rust Client
//!
//! A resilient HTTP client for the Katana manufacturing API. Every request
//! passes through a single transport that retries transient failures,
//! honours server rate limits and aggregates paginated listings, so callers
//! never wrap individual calls in retry logic.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`KatanaConfig`] and [`KatanaConfigBuilder`]
//! - Validated newtypes for the API key and base URL
//! - Exponential backoff for 5xx responses and transport failures
//! - `Retry-After` compliance for 429 responses (seconds or HTTP-date)
//! - Automatic aggregation of `limit`/`page` listings, bounded by a page limit
//! - An explicit client lifecycle with scoped acquisition
//!
//! ## Quick Start
//!
//! ```rust
//! use katana_api::{ApiKey, KatanaConfig};
//!
//! let config = KatanaConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .max_retries(3)
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Making API Requests
//!
//! ```rust,no_run
//! use katana_api::{ApiKey, HttpError, HttpMethod, HttpRequest, KatanaClient, KatanaConfig};
//!
//! # async fn run() -> Result<(), HttpError> {
//! let config = KatanaConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .build()
//!     .unwrap();
//!
//! KatanaClient::scoped(config, |client| async move {
//!     // A GET with `limit` is followed across every page.
//!     let request = HttpRequest::builder(HttpMethod::Get, "products")
//!         .query_param("limit", "100")
//!         .build()?;
//!     let response = client.request(request).await?;
//!     println!("{} products", response.body["pagination"]["total_items"]);
//!     Ok(())
//! })
//! .await
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] spans (`katana_client.request`,
//! `katana_client.paginate`) and events for every retry. It never installs a
//! subscriber; that is left to the application.
//!
//! ## Design Principles
//!
//! - **No global state**: Configuration is instance-based and passed explicitly
//! - **Fail-fast validation**: Configuration and requests validate before any I/O
//! - **Thread-safe**: All types are `Send + Sync`
//! - **Async-first**: Designed for use with Tokio async runtime

pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{ApiKey, BaseUrl, KatanaConfig, KatanaConfigBuilder};
pub use error::ConfigError;

// Re-export HTTP client types
pub use clients::{
    ClientStatus, DataType, HttpError, HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse,
    InvalidHttpRequestError, KatanaClient, RequestExecutor, RequestObserver, TransportConfig,
};
