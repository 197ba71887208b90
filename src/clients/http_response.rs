//! HTTP response types for the Katana API client.
//!
//! This module provides the [`HttpResponse`] type along with the parsed
//! views of the headers that drive control flow: `Link` pagination,
//! `Retry-After` and the informational rate-limit headers.

use std::collections::HashMap;
use std::time::Duration;

use crate::clients::http_request::PAGE_INFO_PARAM;
use crate::clients::rate_limit::{RateLimitStatus, RetryAfter};

/// Pagination cursors parsed from the `Link` header.
///
/// The header format is `<url>; rel="next", <url>; rel="previous"`; the
/// cursor is the `page_info` query parameter of each URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationInfo {
    /// The `page_info` value for the previous page, if available.
    pub prev_page_info: Option<String>,
    /// The `page_info` value for the next page, if available.
    pub next_page_info: Option<String>,
}

impl PaginationInfo {
    /// Parses pagination info from a `Link` header value.
    #[must_use]
    pub fn parse_link_header(header_value: &str) -> Self {
        let mut result = Self::default();

        for link in header_value.split(',') {
            let mut parts = link.split(';').map(str::trim);

            let url = parts
                .next()
                .map(|s| s.trim_start_matches('<').trim_end_matches('>'));

            let rel = parts.find_map(|part| {
                part.strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"'))
            });

            if let (Some(rel), Some(url)) = (rel, url) {
                if let Some(page_info) = Self::extract_page_info(url) {
                    match rel {
                        "previous" | "prev" => result.prev_page_info = Some(page_info),
                        "next" => result.next_page_info = Some(page_info),
                        _ => {}
                    }
                }
            }
        }

        result
    }

    /// Returns `true` when neither cursor is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.prev_page_info.is_none() && self.next_page_info.is_none()
    }

    fn extract_page_info(url: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|param| {
            let (key, value) = param.split_once('=')?;
            (key == PAGE_INFO_PARAM).then(|| {
                urlencoding::decode(value)
                    .map_or_else(|_| value.to_string(), std::borrow::Cow::into_owned)
            })
        })
    }
}

/// An HTTP response from the API.
///
/// Contains the status code, headers, body and the parsed header views.
/// Header names are stored lower-cased so lookups are case-insensitive.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub code: u16,
    /// Response headers (headers may have multiple values).
    pub headers: HashMap<String, Vec<String>>,
    /// The parsed response body.
    pub body: serde_json::Value,
    /// How long the attempt that produced this response took.
    pub elapsed: Duration,
    /// Cursors from the `Link` header, if present.
    pub pagination: Option<PaginationInfo>,
    /// The `Retry-After` hint, if present and parseable.
    pub retry_after: Option<RetryAfter>,
    /// Rate-limit budget from the `X-RateLimit-*` headers, if present.
    pub rate_limit: Option<RateLimitStatus>,
}

impl HttpResponse {
    /// Creates a new `HttpResponse`, parsing the control headers.
    ///
    /// Header names are lower-cased on the way in.
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, body: serde_json::Value) -> Self {
        let headers: HashMap<String, Vec<String>> = headers
            .into_iter()
            .map(|(name, values)| (name.to_ascii_lowercase(), values))
            .collect();

        let first = |name: &str| {
            headers
                .get(name)
                .and_then(|values| values.first())
                .map(String::as_str)
        };

        let pagination = first("link")
            .map(PaginationInfo::parse_link_header)
            .filter(|info| !info.is_empty());
        let retry_after = first("retry-after").and_then(RetryAfter::parse);
        let rate_limit = RateLimitStatus::from_headers(
            first("x-ratelimit-limit"),
            first("x-ratelimit-remaining"),
            first("x-ratelimit-reset"),
        );

        Self {
            code,
            headers,
            body,
            elapsed: Duration::ZERO,
            pagination,
            retry_after,
            rate_limit,
        }
    }

    /// Sets the attempt duration.
    #[must_use]
    pub const fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Builds a response from raw body text.
    ///
    /// Empty bodies become `{}`; bodies that are not JSON are preserved as
    /// `{"raw_body": "..."}` so error details are never lost.
    #[must_use]
    pub fn from_text(code: u16, headers: HashMap<String, Vec<String>>, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw_body": text }))
        };
        Self::new(code, headers, body)
    }

    /// Returns `true` if the response status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }

    /// Returns the first value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns the `X-Request-Id` header value, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-request-id")
    }

    /// Returns the next-page cursor from the `Link` header, if any.
    #[must_use]
    pub fn next_page_info(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|info| info.next_page_info.as_deref())
    }

    /// Renders the error-bearing fields of the body as a compact JSON string.
    ///
    /// Picks `errors`, `error`, `message` and `error_description` when
    /// present, plus a reference to `X-Request-Id` for support requests.
    #[must_use]
    pub fn error_message(&self) -> String {
        let mut error_body = serde_json::Map::new();

        for key in ["errors", "error", "message", "error_description", "raw_body"] {
            if let Some(value) = self.body.get(key) {
                error_body.insert(key.to_string(), value.clone());
            }
        }

        if let Some(request_id) = self.request_id() {
            error_body.insert(
                "error_reference".to_string(),
                serde_json::json!(format!(
                    "If you report this error, please include this id: {request_id}."
                )),
            );
        }

        serde_json::Value::Object(error_body).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
            .collect()
    }

    #[test]
    fn test_is_ok_boundaries() {
        assert!(HttpResponse::new(200, HashMap::new(), json!({})).is_ok());
        assert!(HttpResponse::new(299, HashMap::new(), json!({})).is_ok());
        assert!(!HttpResponse::new(199, HashMap::new(), json!({})).is_ok());
        assert!(!HttpResponse::new(300, HashMap::new(), json!({})).is_ok());
        assert!(!HttpResponse::new(429, HashMap::new(), json!({})).is_ok());
    }

    #[test]
    fn test_link_header_parsing() {
        let link = r#"<https://api.example.com/v1/products?limit=2&page_info=abc123>; rel="next", <https://api.example.com/v1/products?page_info=xyz789>; rel="previous""#;
        let info = PaginationInfo::parse_link_header(link);
        assert_eq!(info.next_page_info, Some("abc123".to_string()));
        assert_eq!(info.prev_page_info, Some("xyz789".to_string()));

        let link = r#"<https://api.example.com/v1/products?page_info=abc%3D%3D>; rel="next""#;
        let info = PaginationInfo::parse_link_header(link);
        assert_eq!(info.next_page_info, Some("abc==".to_string()));
        assert!(info.prev_page_info.is_none());
    }

    #[test]
    fn test_link_header_without_page_info_is_ignored() {
        let response = HttpResponse::new(
            200,
            headers(&[("Link", r#"<https://api.example.com/v1/docs>; rel="help""#)]),
            json!([]),
        );
        assert!(response.pagination.is_none());
        assert!(response.next_page_info().is_none());
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        let response = HttpResponse::new(
            200,
            headers(&[("X-Request-Id", "abc-123"), ("Retry-After", "3")]),
            json!({}),
        );
        assert_eq!(response.request_id(), Some("abc-123"));
        assert_eq!(response.header("RETRY-AFTER"), Some("3"));
        assert_eq!(
            response.retry_after,
            Some(RetryAfter::Delay(Duration::from_secs(3)))
        );
    }

    #[test]
    fn test_from_text_preserves_non_json_bodies() {
        let response = HttpResponse::from_text(502, HashMap::new(), "<html>Bad gateway</html>");
        assert_eq!(response.body, json!({"raw_body": "<html>Bad gateway</html>"}));

        let response = HttpResponse::from_text(204, HashMap::new(), "");
        assert_eq!(response.body, json!({}));
    }

    #[test]
    fn test_error_message_collects_error_fields() {
        let response = HttpResponse::new(
            422,
            headers(&[("x-request-id", "req-9")]),
            json!({"message": "Validation failed", "errors": ["name is required"], "data": []}),
        );
        let message = response.error_message();
        assert!(message.contains("Validation failed"));
        assert!(message.contains("name is required"));
        assert!(message.contains("req-9"));
        assert!(!message.contains("data"));
    }
}
