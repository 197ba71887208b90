//! Integration tests for the client lifecycle, cancellation, observers and
//! concurrent use.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use katana_api::clients::{
    ClientStatus, HttpError, HttpMethod, HttpRequest, HttpResponse, TransportError,
};
use katana_api::{ApiKey, KatanaClient, KatanaConfig, RequestExecutor, RequestObserver};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fails the first attempt for every distinct path with a 503, then succeeds.
#[derive(Default)]
struct FailOncePerPath {
    failed: Mutex<HashSet<String>>,
    calls: AtomicU32,
}

#[async_trait]
impl RequestExecutor for FailOncePerPath {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first_time = self.failed.lock().unwrap().insert(request.path.clone());
        let code = if first_time { 503 } else { 200 };
        Ok(HttpResponse::new(code, HashMap::new(), json!({"path": request.path})))
    }
}

/// Always answers 503.
struct AlwaysUnavailable;

#[async_trait]
impl RequestExecutor for AlwaysUnavailable {
    async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(503, HashMap::new(), json!({})))
    }
}

fn config() -> KatanaConfig {
    KatanaConfig::builder()
        .api_key(ApiKey::new("test-key").unwrap())
        .base_wait_time(Duration::from_secs(1))
        .max_wait_time(Duration::from_secs(60))
        .build()
        .unwrap()
}

fn get(path: &str) -> HttpRequest {
    HttpRequest::builder(HttpMethod::Get, path).build().unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_scoped_client_closes_after_success() {
    let executor: Arc<dyn RequestExecutor> = Arc::new(FailOncePerPath::default());
    let client = KatanaClient::with_executor(config(), executor);
    let handle = client.clone();

    let code = client
        .scope(|client| async move {
            assert_eq!(client.status(), ClientStatus::Open);
            client.request(get("a")).await.map(|r| r.code)
        })
        .await;

    assert!(matches!(code, Ok(200)));
    assert_eq!(handle.status(), ClientStatus::Closed);
}

#[derive(Debug)]
enum AppError {
    Http(HttpError),
    Business(&'static str),
}

impl From<HttpError> for AppError {
    fn from(err: HttpError) -> Self {
        Self::Http(err)
    }
}

#[tokio::test]
async fn test_scoped_client_closes_on_error() {
    let client = KatanaClient::with_executor(config(), Arc::new(AlwaysUnavailable));
    let handle = client.clone();

    let result: Result<(), AppError> = client
        .scope(|_client| async move { Err(AppError::Business("validation failed")) })
        .await;

    assert!(matches!(result, Err(AppError::Business("validation failed"))));
    assert_eq!(handle.status(), ClientStatus::Closed);
    assert!(matches!(
        handle.request(get("a")).await,
        Err(HttpError::ClientClosed)
    ));
}

#[tokio::test]
async fn test_scoped_client_closes_when_future_is_dropped() {
    let client = KatanaClient::with_executor(config(), Arc::new(AlwaysUnavailable));
    let handle = client.clone();

    let scoped = client.scope(|client| async move {
        client.request(get("slow")).await.map(|_| ())
    });
    // The 503 loop sleeps for a second before its first retry.
    let timed_out = tokio::time::timeout(Duration::from_millis(20), scoped).await;

    assert!(timed_out.is_err());
    assert_eq!(handle.status(), ClientStatus::Closed);
}

#[tokio::test]
async fn test_scoped_reports_open_failure_after_close() {
    let client = KatanaClient::with_executor(config(), Arc::new(AlwaysUnavailable));
    client.close();

    let result: Result<(), HttpError> = client.scope(|_| async { Ok(()) }).await;
    assert!(matches!(result, Err(HttpError::ClientClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_back_off_independently() {
    let executor = Arc::new(FailOncePerPath::default());
    let client = KatanaClient::with_executor(config(), executor.clone());
    client.open().unwrap();

    let started = Instant::now();
    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.request(get(&format!("item/{i}"))).await })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.code, 200);
    }

    // Ten one-second backoffs overlap instead of adding up.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 20);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff() {
    let client = KatanaClient::with_executor(config(), Arc::new(AlwaysUnavailable));
    client.open().unwrap();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let err = client
        .request_with_cancellation(get("products"), &token)
        .await
        .unwrap_err();

    match err {
        HttpError::Cancelled { attempts, elapsed } => {
            assert_eq!(attempts, 1);
            assert!(elapsed < Duration::from_secs(1));
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl RequestObserver for Recorder {
    fn on_request(&self, request: &HttpRequest, attempt: u32) {
        self.events
            .lock()
            .unwrap()
            .push(format!("send {} #{attempt}", request.path));
    }

    fn on_response(&self, _request: &HttpRequest, response: &HttpResponse, attempt: u32) {
        self.events
            .lock()
            .unwrap()
            .push(format!("recv {} #{attempt}", response.code));
    }
}

#[tokio::test(start_paused = true)]
async fn test_observers_see_every_attempt() {
    let recorder = Arc::new(Recorder::default());
    let config = KatanaConfig::builder()
        .api_key(ApiKey::new("test-key").unwrap())
        .observer(recorder.clone())
        .build()
        .unwrap();
    let client = KatanaClient::with_executor(config, Arc::new(FailOncePerPath::default()));
    client.open().unwrap();

    client.request(get("orders")).await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["send orders #1", "recv 503 #1", "send orders #2", "recv 200 #2"]
    );
}
