//! Error types for filemeta
//!
//! This module defines the common error types used throughout the system.

use crate::types::StoragePathError;
use filemeta_hashtable::TableError;
use thiserror::Error;

/// Common result type for filemeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error from a durable store, passed through without interpretation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Common error type for filemeta
#[derive(Debug, Error)]
pub enum Error {
    // Cache errors
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("invalid storage path: {0}")]
    InvalidStoragePath(#[from] StoragePathError),

    // Durable store errors
    #[error("persistence error: {0}")]
    Persistence(#[source] BoxError),

    #[error("startup failed: {0}")]
    Startup(#[source] BoxError),

    // Local I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TableError> for Error {
    fn from(e: TableError) -> Self {
        Self::InvalidKey(e.to_string())
    }
}

impl Error {
    /// Create a not found error for a cache key or record id
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Wrap a durable store failure
    pub fn persistence(e: impl Into<BoxError>) -> Self {
        Self::Persistence(e.into())
    }

    /// Wrap a failure that prevents the process from starting
    pub fn startup(e: impl Into<BoxError>) -> Self {
        Self::Startup(e.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if the caller may retry the whole operation.
    ///
    /// Nothing in filemeta retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get HTTP status code for REST callers
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidKey(_) | Self::InvalidStoragePath(_) | Self::InvalidArgument(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 500 Internal Server Error
            Self::Persistence(_) | Self::Io(_) | Self::Internal(_) => 500,

            // 503 Service Unavailable
            Self::Startup(_) | Self::Configuration(_) => 503,
        }
    }
}
