//! Error types for the failover controller
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for failover operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the failover controller
#[derive(Error, Debug)]
pub enum Error {
    /// Name resolution of the public domain failed
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from record store APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The anchor record does not point where the caller believed it did
    #[error("Stated address is {actual}, expected {expected}")]
    SourceMismatch {
        /// Address the caller asserted as current
        expected: String,
        /// Content actually found on the anchor record
        actual: String,
    },

    /// The anchor record changed too recently to be switched again
    #[error("Record {record} updated recently ({age_secs}s ago, window {window_secs}s)")]
    Cooldown {
        /// Record that gates the cooldown
        record: String,
        /// Seconds since the record was last modified
        age_secs: i64,
        /// Configured cooldown window in seconds
        window_secs: i64,
    },

    /// The record store accepted a write but echoed different content
    #[error("Set record {record} to {expected} failed, still {actual}")]
    Verification {
        /// Record that was written
        record: String,
        /// Requested content
        expected: String,
        /// Content echoed back by the store
        actual: String,
    },

    /// Record store specific error
    #[error("Record store error ({store}): {message}")]
    Provider {
        /// Record store name
        store: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a record store specific error
    pub fn provider(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Guard violations are expected outcomes of the anti-flap and
    /// stale-source checks. They skip a family for one cycle and are
    /// logged at a lower level than transport or integrity failures.
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::SourceMismatch { .. } | Self::Cooldown { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_classification() {
        let cooldown = Error::Cooldown {
            record: "@".to_string(),
            age_secs: 30,
            window_secs: 600,
        };
        let mismatch = Error::SourceMismatch {
            expected: "10.0.0.11".to_string(),
            actual: "10.0.0.12".to_string(),
        };
        let verification = Error::Verification {
            record: "@".to_string(),
            expected: "10.0.0.12".to_string(),
            actual: "10.0.0.11".to_string(),
        };

        assert!(cooldown.is_guard());
        assert!(mismatch.is_guard());
        assert!(!verification.is_guard());
        assert!(!Error::http("boom").is_guard());
    }

    #[test]
    fn verification_message_names_divergent_value() {
        let err = Error::Verification {
            record: "www".to_string(),
            expected: "10.0.0.12".to_string(),
            actual: "10.0.0.11".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Set record www to 10.0.0.12 failed, still 10.0.0.11"
        );
    }
}
