//! Request/response observer hooks.
//!
//! Observers see every physical attempt the transport makes. They receive
//! shared references only, so they can record but never influence retry
//! behaviour.

use std::fmt;
use std::sync::Arc;

use crate::clients::errors::TransportError;
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;

/// A hook invoked around each physical attempt.
///
/// All methods default to no-ops. `attempt` is 1-based.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use katana_api::clients::{HttpRequest, HttpResponse, RequestObserver};
///
/// #[derive(Default)]
/// struct StatusCounter(AtomicU32);
///
/// impl RequestObserver for StatusCounter {
///     fn on_response(&self, _request: &HttpRequest, _response: &HttpResponse, _attempt: u32) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait RequestObserver: Send + Sync {
    /// Called before an attempt is sent.
    fn on_request(&self, _request: &HttpRequest, _attempt: u32) {}

    /// Called when an attempt produced a response of any status.
    fn on_response(&self, _request: &HttpRequest, _response: &HttpResponse, _attempt: u32) {}

    /// Called when an attempt failed without a response.
    fn on_transport_error(&self, _request: &HttpRequest, _error: &TransportError, _attempt: u32) {}
}

/// An ordered set of registered observers.
#[derive(Clone, Default)]
pub struct Observers(Vec<Arc<dyn RequestObserver>>);

impl Observers {
    /// Registers an observer; observers are invoked in registration order.
    pub fn push(&mut self, observer: Arc<dyn RequestObserver>) {
        self.0.push(observer);
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn request(&self, request: &HttpRequest, attempt: u32) {
        for observer in &self.0 {
            observer.on_request(request, attempt);
        }
    }

    pub(crate) fn response(&self, request: &HttpRequest, response: &HttpResponse, attempt: u32) {
        for observer in &self.0 {
            observer.on_response(request, response, attempt);
        }
    }

    pub(crate) fn transport_error(&self, request: &HttpRequest, error: &TransportError, attempt: u32) {
        for observer in &self.0 {
            observer.on_transport_error(request, error, attempt);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers").field("count", &self.0.len()).finish()
    }
}
