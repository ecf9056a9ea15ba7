//! Error types for flowmanager-sources
//!
//! Every remote call collapses into this one type. Callers that only care
//! whether a stage succeeded treat all variants alike and log the message.

use thiserror::Error;

/// Data source error type
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connection refused, DNS, TLS, ...)
    #[error("request to {role} failed: {message}")]
    Request {
        /// Source role
        role: String,
        /// Detailed message
        message: String,
    },

    /// Backend answered with a non-success status
    #[error("{role} returned HTTP {status}: {body}")]
    Status {
        /// Source role
        role: String,
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// Response body was not valid JSON
    #[error("failed to decode {role} response: {message}")]
    Decode {
        /// Source role
        role: String,
        /// Detailed message
        message: String,
    },

    /// Backend answered successfully but flagged the payload as an error
    #[error("{role} reported an error: {message}")]
    Remote {
        /// Source role
        role: String,
        /// Message carried by the payload
        message: String,
    },

    /// A template parameter referenced by the term map was not supplied
    #[error("missing template parameter '{param}' for {role}")]
    Template {
        /// Source role
        role: String,
        /// Parameter name
        param: String,
    },

    /// Write attempted on a read-only source
    #[error("{0} is not writable")]
    NotWritable(String),

    /// Local file access failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid source configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
