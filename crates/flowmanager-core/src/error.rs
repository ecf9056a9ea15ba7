//! Error types for flowmanager-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Data source construction or call failed
    #[error("source error: {0}")]
    Source(#[from] flowmanager_sources::Error),

    /// Invalid wiring or configuration (bad aggregate definition, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error (serialization, ...)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
