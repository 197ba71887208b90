//! Multi-page result aggregation.
//!
//! [`PageAggregator`] follows a paginated listing through the
//! [`ResilientTransport`], so every page gets the same retry and rate-limit
//! treatment as a single request. Pages are fetched strictly in order: page
//! N+1 is requested only after page N has succeeded.
//!
//! # Pagination metadata
//!
//! The next cursor is read from the first source that is present:
//!
//! 1. A `Link` header with `rel="next"` (opaque `page_info` token)
//! 2. An `X-Pagination` header holding a JSON object
//! 3. A `pagination` object in the response body
//!
//! Sources 2 and 3 may carry `page`, `total_pages` and `last_page`, as
//! numbers or numeric strings. A response with no metadata is the only page.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{field, Instrument};

use crate::clients::errors::{HttpError, InvalidHttpRequestError, PaginationLimitExceededError};
use crate::clients::http_request::{HttpRequest, LIMIT_PARAM, PAGE_INFO_PARAM, PAGE_PARAM};
use crate::clients::http_response::HttpResponse;
use crate::clients::transport::{ResilientTransport, COMPONENT};

/// Where the next page starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageCursor {
    /// A 1-based page number, sent as the `page` query parameter.
    Page(u32),
    /// An opaque token from a `Link` header, sent as `page_info`.
    Token(String),
}

/// Page metadata reported by one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageMeta {
    /// Cursor-based pagination from the `Link` header.
    Link {
        /// The `page_info` token of the next page, if there is one.
        next: Option<String>,
    },
    /// Numbered pagination from `X-Pagination` or the body.
    Numbered {
        /// The page this response holds.
        page: Option<u32>,
        /// Total number of pages.
        total_pages: Option<u32>,
        /// Whether this is the final page.
        last_page: Option<bool>,
    },
}

impl PageMeta {
    /// Reads pagination metadata from a response, first match wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use serde_json::json;
    /// use katana_api::clients::{HttpResponse, PageCursor, PageMeta};
    ///
    /// let body = json!({"data": [], "pagination": {"page": "2", "total_pages": "3"}});
    /// let response = HttpResponse::new(200, HashMap::new(), body);
    ///
    /// let meta = PageMeta::from_response(&response).unwrap();
    /// assert_eq!(meta.next_cursor(2), Some(PageCursor::Page(3)));
    /// ```
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Option<Self> {
        if let Some(info) = &response.pagination {
            return Some(Self::Link {
                next: info.next_page_info.clone(),
            });
        }

        response
            .header("x-pagination")
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
            .as_ref()
            .and_then(Value::as_object)
            .and_then(Self::from_object)
            .or_else(|| {
                response
                    .body
                    .get("pagination")
                    .and_then(Value::as_object)
                    .and_then(Self::from_object)
            })
    }

    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        let page = object.get("page").and_then(lenient_u32);
        let total_pages = object.get("total_pages").and_then(lenient_u32);
        let last_page = object.get("last_page").and_then(lenient_bool);

        if page.is_none() && total_pages.is_none() && last_page.is_none() {
            return None;
        }
        Some(Self::Numbered {
            page,
            total_pages,
            last_page,
        })
    }

    /// The cursor of the page after this one, if any.
    ///
    /// `current_page` is the page that was requested; it is used when the
    /// metadata does not echo the page number.
    #[must_use]
    pub fn next_cursor(&self, current_page: u32) -> Option<PageCursor> {
        match self {
            Self::Link { next } => next.clone().map(PageCursor::Token),
            Self::Numbered {
                page,
                total_pages,
                last_page,
            } => {
                let page = page.unwrap_or(current_page);
                match (last_page, total_pages) {
                    (Some(true), _) => None,
                    (_, Some(total)) if page < *total => Some(PageCursor::Page(page + 1)),
                    (_, Some(_)) => None,
                    (Some(false), None) => Some(PageCursor::Page(page + 1)),
                    (None, None) => None,
                }
            }
        }
    }
}

fn lenient_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Extracts the items of one page: a top-level array, or the body's `data` array.
///
/// Any other shape is an empty page.
#[must_use]
pub fn extract_items(body: &Value) -> Vec<Value> {
    page_items(body).cloned().unwrap_or_default()
}

fn page_items(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(object) => object.get("data").and_then(Value::as_array),
        _ => None,
    }
}

/// Derives the request for `cursor` from `template`.
///
/// The template itself is never modified; `limit` and every other query
/// parameter carry over unchanged.
#[must_use]
pub fn request_for(template: &HttpRequest, cursor: &PageCursor) -> HttpRequest {
    match cursor {
        PageCursor::Page(page) => template.with_query_param(PAGE_PARAM, page.to_string()),
        PageCursor::Token(token) => template
            .without_query_param(PAGE_PARAM)
            .with_query_param(PAGE_INFO_PARAM, token.as_str()),
    }
}

/// Progress of one aggregation.
#[derive(Clone, Debug)]
pub struct PaginationCursor {
    /// The cursor of the next page to fetch.
    pub cursor: PageCursor,
    /// Items collected so far, in page order.
    pub items: Vec<Value>,
    /// Pages fetched so far.
    pub pages_fetched: u32,
    /// The maximum number of pages this aggregation may fetch.
    pub safety_limit: u32,
}

impl PaginationCursor {
    /// Starts at `cursor`. A zero safety limit is raised to 1.
    #[must_use]
    pub fn new(cursor: PageCursor, safety_limit: u32) -> Self {
        Self {
            cursor,
            items: Vec::new(),
            pages_fetched: 0,
            safety_limit: safety_limit.max(1),
        }
    }

    /// Page number of the current cursor, or the number of pages fetched so
    /// far plus one for token cursors.
    fn current_page(&self) -> u32 {
        match self.cursor {
            PageCursor::Page(page) => page,
            PageCursor::Token(_) => self.pages_fetched + 1,
        }
    }

    const fn limit_reached(&self) -> bool {
        self.pages_fetched >= self.safety_limit
    }
}

struct Collected {
    cursor: PaginationCursor,
    last: HttpResponse,
    elapsed: Duration,
    /// The first page carried pagination metadata or a list of items.
    listing: bool,
}

/// Drives repeated transport calls to collect every page of a listing.
#[derive(Clone, Copy, Debug)]
pub struct PageAggregator<'a> {
    transport: &'a ResilientTransport,
}

impl<'a> PageAggregator<'a> {
    /// Creates an aggregator on top of `transport`.
    #[must_use]
    pub const fn new(transport: &'a ResilientTransport) -> Self {
        Self { transport }
    }

    /// Fetches every page of `template`, starting at page 1 with `page_size`
    /// items per page, and returns the items in page order.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidRequest`] if `page_size` is zero
    /// - [`HttpError::PaginationLimitExceeded`] if more pages remain after
    ///   `safety_limit` pages; the error carries the items collected so far
    /// - Any error from fetching a page; partial items are discarded
    pub async fn fetch_all(
        &self,
        template: &HttpRequest,
        page_size: u32,
        safety_limit: u32,
    ) -> Result<Vec<Value>, HttpError> {
        if page_size == 0 {
            return Err(InvalidHttpRequestError::ZeroPageSize.into());
        }
        let template = template.with_query_param(LIMIT_PARAM, page_size.to_string());
        let collected = self
            .collect(&template, PageCursor::Page(1), safety_limit)
            .await?;
        Ok(collected.cursor.items)
    }

    /// Aggregates a paginated request into one merged response.
    ///
    /// Starts from the template's `page` parameter (default 1). The merged
    /// body is `{"data": [...], "pagination": {"pages_fetched": n, "total_items": m}}`
    /// and the headers are those of the last page.
    ///
    /// A single response with no pagination metadata and no list of items
    /// is not a listing and is returned unchanged.
    ///
    /// # Errors
    ///
    /// As [`fetch_all`](Self::fetch_all).
    pub async fn collect_response(
        &self,
        template: &HttpRequest,
        safety_limit: u32,
    ) -> Result<HttpResponse, HttpError> {
        let start = template
            .query_value(PAGE_PARAM)
            .and_then(|page| page.trim().parse::<u32>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);

        let Collected {
            cursor,
            last,
            elapsed,
            listing,
        } = self
            .collect(template, PageCursor::Page(start), safety_limit)
            .await?;

        if !listing {
            return Ok(last);
        }

        let total_items = cursor.items.len();
        let body = json!({
            "data": cursor.items,
            "pagination": {
                "pages_fetched": cursor.pages_fetched,
                "total_items": total_items,
            },
        });

        Ok(HttpResponse::new(last.code, last.headers, body).with_elapsed(elapsed))
    }

    async fn collect(
        &self,
        template: &HttpRequest,
        start: PageCursor,
        safety_limit: u32,
    ) -> Result<Collected, HttpError> {
        let span = tracing::info_span!(
            "katana_client.paginate",
            component = COMPONENT,
            span.kind = "client",
            http.method = %template.http_method,
            http.url = %self.transport.url_for(&template.path),
            katana.pagination.enabled = true,
            pages = field::Empty,
        );

        async move {
            let mut state = PaginationCursor::new(start, safety_limit);
            let mut elapsed = Duration::ZERO;
            let mut listing = false;

            loop {
                let request = request_for(template, &state.cursor);
                let response = self.transport.execute(&request).await?;
                elapsed += response.elapsed;

                let current_page = state.current_page();
                let meta = PageMeta::from_response(&response);
                if state.pages_fetched == 0 {
                    listing = meta.is_some() || page_items(&response.body).is_some();
                }
                let items = extract_items(&response.body);
                tracing::debug!(
                    page = current_page,
                    items = items.len(),
                    "fetched page"
                );
                state.items.extend(items);
                state.pages_fetched += 1;
                tracing::Span::current().record("pages", state.pages_fetched);

                let next = meta.and_then(|meta| meta.next_cursor(current_page));

                match next {
                    None => {
                        return Ok(Collected {
                            cursor: state,
                            last: response,
                            elapsed,
                            listing,
                        });
                    }
                    Some(_) if state.limit_reached() => {
                        tracing::warn!(
                            limit = state.safety_limit,
                            items = state.items.len(),
                            "pagination safety limit reached with pages remaining"
                        );
                        return Err(PaginationLimitExceededError {
                            limit: state.safety_limit,
                            pages_fetched: state.pages_fetched,
                            partial: state.items,
                        }
                        .into());
                    }
                    Some(cursor) => state.cursor = cursor,
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HttpMethod;
    use std::collections::HashMap;

    fn response(headers: &[(&str, &str)], body: Value) -> HttpResponse {
        let headers: HashMap<String, Vec<String>> = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
            .collect();
        HttpResponse::new(200, headers, body)
    }

    #[test]
    fn test_link_header_takes_precedence() {
        let response = response(
            &[
                (
                    "Link",
                    r#"<https://api.katanamrp.com/v1/products?page_info=abc>; rel="next""#,
                ),
                ("X-Pagination", r#"{"page": 1, "total_pages": 9}"#),
            ],
            json!({"pagination": {"last_page": true}}),
        );

        let meta = PageMeta::from_response(&response).unwrap();
        assert_eq!(
            meta,
            PageMeta::Link {
                next: Some("abc".to_string())
            }
        );
        assert_eq!(meta.next_cursor(1), Some(PageCursor::Token("abc".to_string())));
    }

    #[test]
    fn test_x_pagination_header_before_body() {
        let response = response(
            &[("X-Pagination", r#"{"page": "3", "total_pages": "3"}"#)],
            json!({"pagination": {"page": 1, "total_pages": 5}}),
        );

        let meta = PageMeta::from_response(&response).unwrap();
        assert_eq!(meta.next_cursor(3), None);
    }

    #[test]
    fn test_malformed_header_falls_back_to_body() {
        let response = response(
            &[("X-Pagination", "not json")],
            json!({"data": [], "pagination": {"page": 1, "total_pages": 2}}),
        );

        let meta = PageMeta::from_response(&response).unwrap();
        assert_eq!(meta.next_cursor(1), Some(PageCursor::Page(2)));
    }

    #[test]
    fn test_last_page_flag() {
        let more = PageMeta::Numbered {
            page: None,
            total_pages: None,
            last_page: Some(false),
        };
        assert_eq!(more.next_cursor(4), Some(PageCursor::Page(5)));

        let done = PageMeta::Numbered {
            page: Some(4),
            total_pages: Some(10),
            last_page: Some(true),
        };
        assert_eq!(done.next_cursor(4), None);
    }

    #[test]
    fn test_no_metadata_is_single_page() {
        let response = response(&[], json!([{"id": 1}]));
        assert!(PageMeta::from_response(&response).is_none());

        let empty_object = response_with_body(json!({"pagination": {}}));
        assert!(PageMeta::from_response(&empty_object).is_none());
    }

    fn response_with_body(body: Value) -> HttpResponse {
        response(&[], body)
    }

    #[test]
    fn test_extract_items_shapes() {
        assert_eq!(extract_items(&json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(extract_items(&json!({"data": [3]})), vec![json!(3)]);
        assert!(extract_items(&json!({"data": {"id": 1}})).is_empty());
        assert!(extract_items(&json!("text")).is_empty());
    }

    #[test]
    fn test_request_for_keeps_template_intact() {
        let template = HttpRequest::builder(HttpMethod::Get, "products")
            .query_param("limit", "50")
            .query_param("page", "1")
            .build()
            .unwrap();

        let page = request_for(&template, &PageCursor::Page(4));
        assert_eq!(page.query_value("page"), Some("4"));
        assert_eq!(page.query_value("limit"), Some("50"));

        let token = request_for(&template, &PageCursor::Token("xyz".to_string()));
        assert_eq!(token.query_value("page"), None);
        assert_eq!(token.query_value("page_info"), Some("xyz"));
        assert_eq!(token.query_value("limit"), Some("50"));

        assert_eq!(template.query_value("page"), Some("1"));
    }

    #[test]
    fn test_zero_safety_limit_is_raised() {
        let cursor = PaginationCursor::new(PageCursor::Page(1), 0);
        assert_eq!(cursor.safety_limit, 1);
    }
}
