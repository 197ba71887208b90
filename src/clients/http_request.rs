//! HTTP request types for the Katana API client.
//!
//! This module provides the [`HttpRequest`] type and its builder. Requests
//! are immutable once built; pagination derives new requests with
//! [`HttpRequest::with_query_param`] rather than mutating the template.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::clients::errors::InvalidHttpRequestError;

/// HTTP methods supported by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method for retrieving resources.
    Get,
    /// HTTP POST method for creating resources.
    Post,
    /// HTTP PUT method for replacing resources.
    Put,
    /// HTTP PATCH method for partially updating resources.
    Patch,
    /// HTTP DELETE method for removing resources.
    Delete,
}

impl HttpMethod {
    /// Returns the upper-case method name as sent on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    const fn requires_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// Content type for HTTP request bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    /// JSON content type (`application/json`).
    Json,
    /// Form content type (`application/x-www-form-urlencoded`).
    Form,
}

impl DataType {
    /// Returns the MIME type string for this data type.
    #[must_use]
    pub const fn as_content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// A query parameter value: either a single value or a repeated list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    /// `name=value`
    Single(String),
    /// `name=a&name=b`
    List(Vec<String>),
}

impl QueryValue {
    /// Returns the first value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Query parameter carrying the page number.
pub const PAGE_PARAM: &str = "page";
/// Query parameter carrying the page size.
pub const LIMIT_PARAM: &str = "limit";
/// Query parameter carrying an opaque cursor taken from a `Link` header.
pub const PAGE_INFO_PARAM: &str = "page_info";

/// An HTTP request to be sent to the API.
///
/// Use [`HttpRequest::builder`] to construct requests.
///
/// # Example
///
/// ```rust
/// use katana_api::clients::{HttpRequest, HttpMethod, DataType};
/// use serde_json::json;
///
/// let get_request = HttpRequest::builder(HttpMethod::Get, "products")
///     .query_param("limit", "50")
///     .build()
///     .unwrap();
/// assert!(get_request.is_paginated());
///
/// let post_request = HttpRequest::builder(HttpMethod::Post, "products")
///     .body(json!({"name": "Widget"}))
///     .body_type(DataType::Json)
///     .build()
///     .unwrap();
/// assert!(!post_request.is_paginated());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// The HTTP method for this request.
    pub http_method: HttpMethod,
    /// The path relative to the client's base URL, or an absolute URL.
    pub path: String,
    /// The request body, if any.
    pub body: Option<serde_json::Value>,
    /// The content type of the body.
    pub body_type: Option<DataType>,
    /// Query parameters, keyed by name.
    pub query: BTreeMap<String, QueryValue>,
    /// Additional headers (names are stored lower-cased).
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout overriding the client default.
    pub timeout: Option<Duration>,
    /// Whether `limit`/`page` queries on GET requests are followed across pages.
    pub auto_paginate: bool,
}

impl HttpRequest {
    /// Creates a new builder for constructing an `HttpRequest`.
    #[must_use]
    pub fn builder(method: HttpMethod, path: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, path)
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHttpRequestError`] if:
    /// - `body` is `Some` but `body_type` is `None`
    /// - `http_method` is `Post`, `Put` or `Patch` but `body` is `None`
    pub fn verify(&self) -> Result<(), InvalidHttpRequestError> {
        if self.body.is_some() && self.body_type.is_none() {
            return Err(InvalidHttpRequestError::MissingBodyType);
        }

        if self.http_method.requires_body() && self.body.is_none() {
            return Err(InvalidHttpRequestError::MissingBody {
                method: self.http_method.as_str().to_lowercase(),
            });
        }

        Ok(())
    }

    /// Returns `true` if this request should be aggregated across pages.
    ///
    /// A request is paginated when it is a GET carrying a `limit` or `page`
    /// query parameter and auto-pagination has not been disabled.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.auto_paginate
            && self.http_method == HttpMethod::Get
            && (self.query.contains_key(LIMIT_PARAM) || self.query.contains_key(PAGE_PARAM))
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(QueryValue::first)
    }

    /// Returns a header value (case-insensitive lookup).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns a copy of this request with one query parameter set.
    #[must_use]
    pub fn with_query_param(&self, name: &str, value: impl Into<QueryValue>) -> Self {
        let mut next = self.clone();
        next.query.insert(name.to_string(), value.into());
        next
    }

    /// Returns a copy of this request with one query parameter removed.
    #[must_use]
    pub fn without_query_param(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.query.remove(name);
        next
    }

    /// Flattens the query map into `(name, value)` pairs, expanding lists.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::with_capacity(self.query.len());
        for (name, value) in &self.query {
            match value {
                QueryValue::Single(v) => pairs.push((name.as_str(), v.as_str())),
                QueryValue::List(values) => {
                    pairs.extend(values.iter().map(|v| (name.as_str(), v.as_str())));
                }
            }
        }
        pairs
    }
}

/// Builder for constructing [`HttpRequest`] instances.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    http_method: HttpMethod,
    path: String,
    body: Option<serde_json::Value>,
    body_type: Option<DataType>,
    query: BTreeMap<String, QueryValue>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    auto_paginate: bool,
}

impl HttpRequestBuilder {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            http_method: method,
            path: path.into(),
            body: None,
            body_type: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout: None,
            auto_paginate: true,
        }
    }

    /// Sets the request body.
    ///
    /// When setting a body, you must also set the body type via [`body_type`](Self::body_type).
    #[must_use]
    pub fn body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the content type of the request body.
    #[must_use]
    pub const fn body_type(mut self, body_type: DataType) -> Self {
        self.body_type = Some(body_type);
        self
    }

    /// Sets a single query parameter, replacing any previous value.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .insert(key.into(), QueryValue::Single(value.into()));
        self
    }

    /// Sets a repeated query parameter (`key=a&key=b`).
    #[must_use]
    pub fn query_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.insert(
            key.into(),
            QueryValue::List(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Adds a single header. Names are case-insensitive.
    #[must_use]
    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Overrides the client's timeout for this request.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables automatic pagination (enabled by default).
    #[must_use]
    pub const fn auto_paginate(mut self, enabled: bool) -> Self {
        self.auto_paginate = enabled;
        self
    }

    /// Builds the [`HttpRequest`], validating it in the process.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHttpRequestError`] if the request fails validation.
    pub fn build(self) -> Result<HttpRequest, InvalidHttpRequestError> {
        let request = HttpRequest {
            http_method: self.http_method,
            path: self.path,
            body: self.body,
            body_type: self.body_type,
            query: self.query,
            headers: self.headers,
            timeout: self.timeout,
            auto_paginate: self.auto_paginate,
        };
        request.verify()?;
        Ok(request)
    }
}
