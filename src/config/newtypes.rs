//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use reqwest::header::HeaderValue;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated Katana API key.
///
/// This newtype ensures the key is non-empty and usable in an HTTP header,
/// and masks its value in debug output to prevent accidental exposure in logs.
///
/// # Example
///
/// ```rust
/// use katana_api::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// assert_eq!(format!("{:?}", key), "ApiKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// Surrounding whitespace is trimmed; a key that is empty afterwards is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty, or
    /// [`ConfigError::InvalidValue`] if it contains characters that cannot
    /// appear in an `Authorization` header.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        if HeaderValue::from_str(&format!("Bearer {key}")).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "api_key",
                reason: "contains characters not allowed in an HTTP header".to_string(),
            });
        }
        Ok(Self(key.to_string()))
    }

    /// Returns the value of the `Authorization` header for this key.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(*****)")
    }
}

/// A validated API base URL.
///
/// The URL must use the `http` or `https` scheme and contain a host. A
/// trailing slash is stripped so that request paths can be joined with a
/// single `/`.
///
/// # Serialization
///
/// `BaseUrl` serializes to and deserializes from its string form:
///
/// ```rust
/// use katana_api::BaseUrl;
///
/// let url = BaseUrl::new("https://api.katanamrp.com/v1/").unwrap();
/// let json = serde_json::to_string(&url).unwrap();
/// assert_eq!(json, r#""https://api.katanamrp.com/v1""#);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrl {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl BaseUrl {
    /// The production Katana API endpoint.
    pub const DEFAULT: &'static str = "https://api.katanamrp.com/v1";

    /// Creates a new validated base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL has no `http`/`https`
    /// scheme or no host, carries a query string or fragment, or contains
    /// whitespace or control characters.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidBaseUrl { url: url.clone() };

        if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid());
        }

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = &url[..scheme_end];
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        if host_start >= url.len() || url.contains(['?', '#']) {
            return Err(invalid());
        }

        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/'])
            .map_or(url.len(), |i| host_start + i);
        if host_end == host_start {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme (e.g., "https").
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Joins a request path onto this base URL.
    ///
    /// Absolute `http(s)://` paths are returned unchanged so that cursors
    /// taken verbatim from `Link` headers can be followed.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{path}", self.url)
        }
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self {
            url: Self::DEFAULT.to_string(),
            scheme_end: 5,
            host_start: 8,
            host_end: 25,
        }
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.url)
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_rejects_empty_string() {
        assert!(matches!(ApiKey::new(""), Err(ConfigError::EmptyApiKey)));
        assert!(matches!(ApiKey::new("   "), Err(ConfigError::EmptyApiKey)));
    }

    #[test]
    fn test_api_key_masks_value_in_debug() {
        let key = ApiKey::new("super-secret-key").unwrap();
        let debug_output = format!("{key:?}");
        assert_eq!(debug_output, "ApiKey(*****)");
        assert!(!debug_output.contains("super-secret-key"));
    }

    #[test]
    fn test_api_key_rejects_header_unsafe_characters() {
        for key in ["abc\ndef", "abc\r\nX-Injected: 1", "abc\u{0}def"] {
            assert!(matches!(
                ApiKey::new(key),
                Err(ConfigError::InvalidValue { field: "api_key", .. })
            ));
        }
    }

    #[test]
    fn test_api_key_bearer_header() {
        let key = ApiKey::new(" abc123 ").unwrap();
        assert_eq!(key.bearer(), "Bearer abc123");
    }

    #[test]
    fn test_base_url_validates_format() {
        let url = BaseUrl::new("https://api.katanamrp.com/v1").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_name(), "api.katanamrp.com");

        let url = BaseUrl::new("http://localhost:3000").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_name(), "localhost");
    }

    #[test]
    fn test_base_url_rejects_invalid() {
        assert!(BaseUrl::new("api.katanamrp.com").is_err());
        assert!(BaseUrl::new("https://").is_err());
        assert!(BaseUrl::new("ftp://example.com").is_err());
        assert!(BaseUrl::new("https://example.com/v1?x=1").is_err());
        assert!(BaseUrl::new("https:///v1").is_err());
        assert!(BaseUrl::new("https://api.example.com/v 1").is_err());
        assert!(BaseUrl::new("https://api.example.com/v1\n/x").is_err());
        assert!(BaseUrl::new("https://api.exa\tmple.com").is_err());
    }

    #[test]
    fn test_default_base_url_matches_parsed_form() {
        assert_eq!(BaseUrl::default(), BaseUrl::new(BaseUrl::DEFAULT).unwrap());
    }

    #[test]
    fn test_join_handles_slashes_and_absolute_urls() {
        let url = BaseUrl::new("https://api.example.com/v1/").unwrap();
        assert_eq!(url.join("products"), "https://api.example.com/v1/products");
        assert_eq!(url.join("/products"), "https://api.example.com/v1/products");
        assert_eq!(url.join(""), "https://api.example.com/v1");
        assert_eq!(
            url.join("https://other.example.com/x?page_info=abc"),
            "https://other.example.com/x?page_info=abc"
        );
    }

    #[test]
    fn test_base_url_deserialize_validates() {
        let url: BaseUrl = serde_json::from_str(r#""https://api.example.com""#).unwrap();
        assert_eq!(url.as_ref(), "https://api.example.com");
        assert!(serde_json::from_str::<BaseUrl>(r#""not a url""#).is_err());
    }
}
