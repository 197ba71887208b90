//! The Katana API client and its lifecycle.
//!
//! [`KatanaClient`] owns the pooled connection and routes every request
//! through the [`ResilientTransport`]. It moves through three states:
//! `Unopened → Open → Closed`. A closed client cannot be reopened.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::clients::errors::HttpError;
use crate::clients::executor::{ReqwestExecutor, RequestExecutor};
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;
use crate::clients::pagination::PageAggregator;
use crate::clients::transport::ResilientTransport;
use crate::config::KatanaConfig;

/// Observable lifecycle state of a [`KatanaClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientStatus {
    /// Created but not yet opened.
    Unopened,
    /// Ready to send requests.
    Open,
    /// Closed; every request fails with [`HttpError::ClientClosed`].
    Closed,
}

#[derive(Debug)]
enum ClientState {
    Unopened,
    Open(Arc<ResilientTransport>),
    Closed,
}

/// Client for the Katana API.
///
/// The client is a cheap handle: clones share the same connection pool and
/// lifecycle, so closing one clone closes them all. Requests already in
/// flight when the client closes run to completion.
///
/// # Thread Safety
///
/// `KatanaClient` is `Send + Sync`, making it safe to share across async tasks.
///
/// # Example
///
/// ```rust,no_run
/// use katana_api::{ApiKey, KatanaClient, KatanaConfig};
/// use katana_api::clients::{HttpError, HttpMethod, HttpRequest};
///
/// # async fn run() -> Result<(), HttpError> {
/// let config = KatanaConfig::builder()
///     .api_key(ApiKey::new("your-api-key").unwrap())
///     .build()
///     .unwrap();
///
/// let products = KatanaClient::scoped(config, |client| async move {
///     let request = HttpRequest::builder(HttpMethod::Get, "products").build()?;
///     client.fetch_all(&request, 50).await
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KatanaClient {
    config: KatanaConfig,
    state: Arc<RwLock<ClientState>>,
    executor: Option<Arc<dyn RequestExecutor>>,
}

// Verify KatanaClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<KatanaClient>();
};

impl KatanaClient {
    /// Creates an unopened client. No connection is made until [`open`](Self::open).
    #[must_use]
    pub fn new(config: KatanaConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(ClientState::Unopened)),
            executor: None,
        }
    }

    /// Creates an unopened client that sends through `executor` instead of
    /// the built-in `reqwest` executor.
    #[must_use]
    pub fn with_executor(config: KatanaConfig, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            executor: Some(executor),
            ..Self::new(config)
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &KatanaConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        match *self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ClientState::Unopened => ClientStatus::Unopened,
            ClientState::Open(_) => ClientStatus::Open,
            ClientState::Closed => ClientStatus::Closed,
        }
    }

    /// Opens the client, building the connection pool.
    ///
    /// Opening an open client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientClosed`] if the client was closed, or
    /// [`HttpError::Setup`] if the connection pool cannot be built.
    pub fn open(&self) -> Result<(), HttpError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ClientState::Open(_) => return Ok(()),
            ClientState::Closed => return Err(HttpError::ClientClosed),
            ClientState::Unopened => {}
        }

        let executor: Arc<dyn RequestExecutor> = match &self.executor {
            Some(executor) => Arc::clone(executor),
            None => Arc::new(ReqwestExecutor::new(&self.config)?),
        };
        let transport = ResilientTransport::new(executor, *self.config.transport())
            .with_observers(self.config.observers().clone())
            .with_base_url(self.config.base_url().clone());

        *state = ClientState::Open(Arc::new(transport));
        tracing::info!(base_url = %self.config.base_url(), "client opened");
        Ok(())
    }

    /// Closes the client and releases the connection pool.
    ///
    /// Closing is idempotent, and a client that was never opened can be
    /// closed too.
    pub fn close(&self) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, ClientState::Closed)
        };
        if matches!(previous, ClientState::Open(_)) {
            tracing::info!(base_url = %self.config.base_url(), "client closed");
        }
    }

    fn transport(&self) -> Result<Arc<ResilientTransport>, HttpError> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ClientState::Open(transport) => Ok(Arc::clone(transport)),
            ClientState::Unopened => Err(HttpError::ClientNotOpen),
            ClientState::Closed => Err(HttpError::ClientClosed),
        }
    }

    /// Sends a request.
    ///
    /// GET requests carrying a `limit` or `page` query parameter are
    /// aggregated across pages unless auto-pagination was disabled on the
    /// request; the merged response body is
    /// `{"data": [...], "pagination": {"pages_fetched": n, "total_items": m}}`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientNotOpen`] or [`HttpError::ClientClosed`]
    /// outside the open state, and otherwise any error of
    /// [`ResilientTransport::execute`] or [`PageAggregator::collect_response`].
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let transport = self.transport()?;
        if request.is_paginated() {
            PageAggregator::new(&transport)
                .collect_response(&request, self.config.max_pages())
                .await
        } else {
            transport.execute(&request).await
        }
    }

    /// Sends a single request that aborts promptly when `token` is cancelled.
    ///
    /// Auto-pagination is not applied.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`HttpError::Cancelled`].
    pub async fn request_with_cancellation(
        &self,
        request: HttpRequest,
        token: &CancellationToken,
    ) -> Result<HttpResponse, HttpError> {
        let transport = self.transport()?;
        transport.execute_with_cancellation(&request, token).await
    }

    /// Fetches every page of `template` and returns the items in page order.
    ///
    /// The configured `max_pages` is the safety limit.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::ClientNotOpen`] or [`HttpError::ClientClosed`]
    /// outside the open state, and otherwise any error of
    /// [`PageAggregator::fetch_all`].
    pub async fn fetch_all(
        &self,
        template: &HttpRequest,
        page_size: u32,
    ) -> Result<Vec<Value>, HttpError> {
        let transport = self.transport()?;
        PageAggregator::new(&transport)
            .fetch_all(template, page_size, self.config.max_pages())
            .await
    }

    /// Opens the client, runs `body`, then closes the client.
    ///
    /// The client is closed on every exit path: success, error, panic, or
    /// the returned future being dropped.
    ///
    /// # Errors
    ///
    /// Returns the open error or whatever `body` returns.
    pub async fn scope<F, Fut, T, E>(self, body: F) -> Result<T, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<HttpError>,
    {
        let _guard = CloseGuard(self.clone());
        self.open()?;
        body(self).await
    }

    /// Creates a client for `config` and runs `body` inside [`scope`](Self::scope).
    ///
    /// # Errors
    ///
    /// Returns the open error or whatever `body` returns.
    pub async fn scoped<F, Fut, T, E>(config: KatanaConfig, body: F) -> Result<T, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<HttpError>,
    {
        Self::new(config).scope(body).await
    }
}

impl fmt::Debug for KatanaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KatanaClient")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("custom_executor", &self.executor.is_some())
            .finish()
    }
}

struct CloseGuard(KatanaClient);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}
