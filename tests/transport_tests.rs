//! Integration tests for the resilient transport against a mock server.
//!
//! These run on the real clock with millisecond waits, exercising the
//! `reqwest` executor end to end.

use std::time::{Duration, Instant};

use katana_api::clients::{
    HttpError, HttpMethod, HttpRequest, InvalidHttpRequestError, Jitter, TransportError,
};
use katana_api::{ApiKey, BaseUrl, DataType, KatanaClient, KatanaConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(base_url: &str, max_retries: u32) -> KatanaConfig {
    KatanaConfig::builder()
        .api_key(ApiKey::new("test-key").unwrap())
        .base_url(BaseUrl::new(base_url).unwrap())
        .max_retries(max_retries)
        .base_wait_time(Duration::from_millis(10))
        .max_wait_time(Duration::from_secs(2))
        .build()
        .unwrap()
}

fn open_client(server: &MockServer, max_retries: u32) -> KatanaClient {
    let client = KatanaClient::new(config_for(&server.uri(), max_retries));
    client.open().unwrap();
    client
}

fn get(path: &str) -> HttpRequest {
    HttpRequest::builder(HttpMethod::Get, path).build().unwrap()
}

#[tokio::test]
async fn test_server_errors_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .with_priority(1)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server, 5);
    let response = client.request(get("products")).await.unwrap();

    assert_eq!(response.code, 200);
    assert_eq!(response.body, json!({"id": 7}));
}

#[tokio::test]
async fn test_client_errors_make_a_single_attempt() {
    for status in [400u16, 404, 422] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("X-Request-Id", "req-123")
                    .set_body_json(json!({"message": "nope"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = open_client(&server, 5);
        let err = client.request(get("missing")).await.unwrap_err();

        match err {
            HttpError::TerminalClient(failure) => {
                assert_eq!(failure.status, status);
                assert_eq!(failure.attempts, 1);
                assert_eq!(failure.body["message"], "nope");
                assert_eq!(failure.error_reference.as_deref(), Some("req-123"));
            }
            other => panic!("expected TerminalClient, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let client = open_client(&server, 3);
    let err = client.request(get("products")).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.attempts(), Some(4));
    match err {
        HttpError::RetryExhausted(e) => {
            assert_eq!(e.body["raw_body"], "Service Unavailable");
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.3"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = open_client(&server, 5);
    let started = Instant::now();
    let response = client.request(get("products")).await.unwrap();

    assert_eq!(response.code, 200);
    // The hint wins over the 10ms backoff.
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server, 0);
    let response = client.request(get("products")).await.unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.body, json!({}));
}

#[tokio::test]
async fn test_json_body_and_query_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sales_orders"))
        .and(query_param("include", "rows"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"customer_id": 12})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 99})))
        .expect(1)
        .mount(&server)
        .await;

    let client = open_client(&server, 0);
    let request = HttpRequest::builder(HttpMethod::Post, "sales_orders")
        .query_param("include", "rows")
        .body(json!({"customer_id": 12}))
        .body_type(DataType::Json)
        .build()
        .unwrap();

    let response = client.request(request).await.unwrap();
    assert_eq!(response.code, 201);
    assert_eq!(response.body["id"], 99);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_failure() {
    // Nothing listens on port 1.
    let client = KatanaClient::new(config_for("http://127.0.0.1:1", 2));
    client.open().unwrap();

    let err = client.request(get("products")).await.unwrap_err();
    match err {
        HttpError::Transport(failure) => {
            assert_eq!(failure.attempts, 3);
            assert!(matches!(failure.source, TransportError::Connect(_)));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_response_times_out_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let client = open_client(&server, 1);
    let request = HttpRequest::builder(HttpMethod::Get, "products")
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client.request(request).await.unwrap_err();
    match err {
        HttpError::Transport(failure) => {
            assert_eq!(failure.source, TransportError::Timeout);
            assert_eq!(failure.attempts, 2);
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_jittered_backoff_still_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = KatanaConfig::builder()
        .api_key(ApiKey::new("test-key").unwrap())
        .base_url(BaseUrl::new(server.uri()).unwrap())
        .base_wait_time(Duration::from_millis(5))
        .max_wait_time(Duration::from_millis(50))
        .jitter(Jitter::Bounded)
        .build()
        .unwrap();
    let client = KatanaClient::new(config);
    client.open().unwrap();

    assert_eq!(client.request(get("products")).await.unwrap().code, 200);
}

#[tokio::test]
async fn test_unsendable_header_fails_once_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = KatanaConfig::builder()
        .api_key(ApiKey::new("test-key").unwrap())
        .base_url(BaseUrl::new(server.uri()).unwrap())
        .max_retries(3)
        .base_wait_time(Duration::from_millis(100))
        .build()
        .unwrap();
    let client = KatanaClient::new(config);
    client.open().unwrap();
    let request = HttpRequest::builder(HttpMethod::Get, "products")
        .header("X-Bad", "a\nb")
        .build()
        .unwrap();

    let started = Instant::now();
    let err = client.request(request).await.unwrap_err();

    assert!(matches!(
        err,
        HttpError::InvalidRequest(InvalidHttpRequestError::Unsendable { .. })
    ));
    assert_eq!(err.attempts(), None);
    // No backoff was slept.
    assert!(started.elapsed() < Duration::from_millis(100));
}
