//! Configuration types for the Katana API client.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`KatanaConfig`]: All client settings, validated at build time
//! - [`KatanaConfigBuilder`]: A builder for constructing [`KatanaConfig`] instances
//! - [`ApiKey`]: A validated API key newtype with masked debug output
//! - [`BaseUrl`]: A validated API base URL
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use katana_api::{ApiKey, KatanaConfig};
//!
//! let config = KatanaConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .max_retries(3)
//!     .timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.transport().max_retries(), 3);
//! ```

mod newtypes;

pub use newtypes::{ApiKey, BaseUrl};

use std::sync::Arc;
use std::time::Duration;

use crate::clients::{Jitter, Observers, RequestObserver, TransportConfig};
use crate::error::ConfigError;

/// Configuration for the Katana API client.
///
/// # Thread Safety
///
/// `KatanaConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
#[derive(Clone, Debug)]
pub struct KatanaConfig {
    api_key: ApiKey,
    base_url: BaseUrl,
    transport: TransportConfig,
    max_pages: u32,
    user_agent_prefix: Option<String>,
    observers: Observers,
}

impl KatanaConfig {
    /// Default pagination safety limit.
    pub const DEFAULT_MAX_PAGES: u32 = 100;

    /// Creates a new builder for constructing a `KatanaConfig`.
    #[must_use]
    pub fn builder() -> KatanaConfigBuilder {
        KatanaConfigBuilder::new()
    }

    /// Returns the API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the retry and timeout settings.
    #[must_use]
    pub const fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Returns the maximum number of pages one aggregation may fetch.
    #[must_use]
    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns the registered request observers.
    #[must_use]
    pub const fn observers(&self) -> &Observers {
        &self.observers
    }
}

// Verify KatanaConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<KatanaConfig>();
};

/// Builder for constructing [`KatanaConfig`] instances.
///
/// `api_key` is the only required field.
///
/// # Defaults
///
/// - `base_url`: `https://api.katanamrp.com/v1`
/// - `timeout`: 30 seconds
/// - `max_retries`: 5
/// - `base_wait_time` / `max_wait_time`: 1 second / 60 seconds
/// - `jitter`: off
/// - `max_pages`: 100
/// - `user_agent_prefix`: `None`
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use katana_api::{ApiKey, BaseUrl, KatanaConfig};
/// use katana_api::clients::Jitter;
///
/// let config = KatanaConfig::builder()
///     .api_key(ApiKey::new("key").unwrap())
///     .base_url(BaseUrl::new("https://staging.example.com/v1").unwrap())
///     .base_wait_time(Duration::from_millis(200))
///     .max_wait_time(Duration::from_secs(5))
///     .jitter(Jitter::Bounded)
///     .max_pages(20)
///     .user_agent_prefix("MyApp/1.0")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_pages(), 20);
/// ```
#[derive(Debug, Default)]
pub struct KatanaConfigBuilder {
    api_key: Option<ApiKey>,
    base_url: Option<BaseUrl>,
    max_retries: Option<u32>,
    base_wait_time: Option<Duration>,
    max_wait_time: Option<Duration>,
    timeout: Option<Duration>,
    jitter: Option<Jitter>,
    max_pages: Option<u32>,
    user_agent_prefix: Option<String>,
    observers: Observers,
}

impl KatanaConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: BaseUrl) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the number of retries after the first attempt. 0 disables retrying.
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

    /// Sets the upper bound on any single wait, including `Retry-After` hints.
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

    /// Sets the pagination safety limit.
    #[must_use]
    pub const fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Registers a request observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Builds the [`KatanaConfig`], validating every setting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key` is not set,
    /// [`ConfigError::InvalidWaitBounds`] if the base wait exceeds the max
    /// wait, or [`ConfigError::InvalidValue`] for a zero timeout or a zero
    /// page limit.
    pub fn build(self) -> Result<KatanaConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;

        let mut transport = TransportConfig::builder();
        if let Some(max_retries) = self.max_retries {
            transport = transport.max_retries(max_retries);
        }
        if let Some(wait) = self.base_wait_time {
            transport = transport.base_wait_time(wait);
        }
        if let Some(wait) = self.max_wait_time {
            transport = transport.max_wait_time(wait);
        }
        if let Some(timeout) = self.timeout {
            transport = transport.timeout(timeout);
        }
        if let Some(jitter) = self.jitter {
            transport = transport.jitter(jitter);
        }
        let transport = transport.build()?;

        let max_pages = self.max_pages.unwrap_or(KatanaConfig::DEFAULT_MAX_PAGES);
        if max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_pages",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(KatanaConfig {
            api_key,
            base_url: self.base_url.unwrap_or_default(),
            transport,
            max_pages,
            user_agent_prefix: self.user_agent_prefix,
            observers: self.observers,
        })
    }
}
