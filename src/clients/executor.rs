//! The pluggable request executor.
//!
//! [`RequestExecutor`] is the single seam every call path goes through: it
//! performs exactly one physical attempt and reports either a response (of
//! any status) or a [`TransportError`]. Retry, rate-limit and pagination
//! policy live above it in [`ResilientTransport`](crate::clients::ResilientTransport),
//! so swapping the executor (for a test double or another HTTP stack) never
//! changes resilience behaviour.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::time::Instant;

use crate::clients::errors::{HttpError, TransportError};
use crate::clients::http_request::{DataType, HttpRequest};
use crate::clients::http_response::HttpResponse;
use crate::config::{BaseUrl, KatanaConfig};

/// Client version from Cargo.toml.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sends a single physical attempt of a request.
///
/// Implementations must be cheap to call concurrently; any connection
/// pooling they do is internally synchronized.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Sends `request` once.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained. Non-2xx
    /// statuses are *not* errors at this layer.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`RequestExecutor`] backed by a pooled [`reqwest::Client`].
///
/// The pool is released when the executor is dropped.
pub struct ReqwestExecutor {
    client: reqwest::Client,
    base_url: BaseUrl,
    default_headers: HashMap<String, String>,
}

impl ReqwestExecutor {
    /// Builds the connection pool and default headers for `config`.
    ///
    /// Default headers are `Authorization: Bearer <api key>`,
    /// `Accept: application/json` and a `User-Agent` identifying this crate
    /// (prefixed with the configured user agent prefix, if any).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Setup`] if the TLS backend cannot be initialized.
    pub fn new(config: &KatanaConfig) -> Result<Self, HttpError> {
        let user_agent_prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        let user_agent =
            format!("{user_agent_prefix}Katana API Rust Client v{CLIENT_VERSION} | Rust {rust_version}");

        let mut default_headers = HashMap::new();
        default_headers.insert("User-Agent".to_string(), user_agent);
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        default_headers.insert("Authorization".to_string(), config.api_key().bearer());

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.transport().timeout())
            .build()
            .map_err(HttpError::Setup)?;

        Ok(Self {
            client,
            base_url: config.base_url().clone(),
            default_headers,
        })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the default headers attached to every request.
    #[must_use]
    pub const fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    fn parse_response_headers(
        headers: &reqwest::header::HeaderMap,
    ) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}

impl fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values carry the bearer token.
        f.debug_struct("ReqwestExecutor")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.base_url.join(&request.path);
        let mut req_builder = self.client.request(request.http_method.into(), &url);

        for (key, value) in &self.default_headers {
            // Per-request headers override defaults.
            if request.headers.contains_key(&key.to_ascii_lowercase()) {
                continue;
            }
            req_builder = req_builder.header(key, value);
        }
        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let query = request.query_pairs();
        if !query.is_empty() {
            req_builder = req_builder.query(&query);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        if let Some(body) = &request.body {
            req_builder = match request.body_type {
                Some(DataType::Form) => req_builder.form(body),
                _ => req_builder
                    .header(CONTENT_TYPE, DataType::Json.as_content_type())
                    .body(body.to_string()),
            };
        }

        let started = Instant::now();
        let res = req_builder.send().await?;
        let code = res.status().as_u16();
        let headers = Self::parse_response_headers(res.headers());
        let text = res.text().await?;
        let elapsed: Duration = started.elapsed();

        Ok(HttpResponse::from_text(code, headers, &text).with_elapsed(elapsed))
    }
}
