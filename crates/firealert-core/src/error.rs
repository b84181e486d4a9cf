//! Error types for the fire-alert bridge
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the fire-alert bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input to a store or notifier operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A push was attempted with no recipient token on record
    #[error("No push recipient configured")]
    NoRecipientConfigured,

    /// A datagram handler failed
    #[error("Handler '{handler}' failed: {message}")]
    Handler {
        /// Handler name
        handler: String,
        /// Error message
        message: String,
    },

    /// Payload is not valid UTF-8 where decoding is required
    #[error("Decode error: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token store errors
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// Audit sink errors
    #[error("Audit sink error: {0}")]
    AuditSink(String),

    /// Push backend errors
    #[error("Push backend error ({backend}): {message}")]
    Push {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Socket and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a handler failure attributed to `handler`
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a token store error
    pub fn token_store(msg: impl Into<String>) -> Self {
        Self::TokenStore(msg.into())
    }

    /// Create an audit sink error
    pub fn audit_sink(msg: impl Into<String>) -> Self {
        Self::AuditSink(msg.into())
    }

    /// Create a push backend error
    pub fn push(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Push {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether this error means "no recipient on record" rather than a failure
    pub fn is_no_recipient(&self) -> bool {
        matches!(self, Self::NoRecipientConfigured)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
