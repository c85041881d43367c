//! Error types for podcatcher
//!
//! The engine contains almost every failure internally (see the crate docs):
//! fetch and persistence errors become log records, never values handed to
//! snapshot readers. The error type below is what the building blocks
//! (source reader, dispatcher, state store) return to the engine, and what the
//! handle returns once the engine has stopped.

use thiserror::Error;

/// Result type alias for podcatcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for podcatcher
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "refresh_interval")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Numeric HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Feed document could not be parsed as RSS or Atom
    #[error("feed parse error: {0}")]
    FeedParse(String),

    /// Serialization error (state file)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A URL could not be parsed or has no usable path
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The engine has stopped and no longer accepts requests
    #[error("shutdown in progress: engine is not accepting requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error came from talking to a remote server
    ///
    /// Network failures, bad statuses and unparsable documents are the
    /// "fetch errors" the engine contains per subscription.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::HttpStatus { .. } | Error::FeedParse(_)
        )
    }
}
