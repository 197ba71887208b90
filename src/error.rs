//! Error types for the Katana API client.
//!
//! This module contains the configuration error type. Configuration is
//! validated when it is built, so a missing credential or a malformed base
//! URL surfaces immediately instead of as a deferred network failure.
//!
//! # Example
//!
//! ```rust
//! use katana_api::{ApiKey, ConfigError};
//!
//! let result = ApiKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
//! ```

use thiserror::Error;

/// Errors that can occur while building client configuration.
///
/// Each variant provides a clear, actionable error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Katana API key.")]
    EmptyApiKey,

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// Base URL is invalid.
    #[error("Invalid base URL '{url}'. Please provide a URL with an http or https scheme (e.g., 'https://api.katanamrp.com/v1').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The retry wait bounds are inconsistent.
    #[error("Invalid retry wait times: base wait of {base_ms}ms exceeds max wait of {max_ms}ms.")]
    InvalidWaitBounds {
        /// The configured base wait in milliseconds.
        base_ms: u128,
        /// The configured max wait in milliseconds.
        max_ms: u128,
    },

    /// A numeric setting is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
