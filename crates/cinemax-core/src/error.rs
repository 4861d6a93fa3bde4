//! Error types for the cinemax pipeline.

use thiserror::Error;

/// Result type alias using cinemax's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cinemax operations.
///
/// Per-record data-quality problems (missing fields, malformed release dates)
/// never reach this type; the normalizer degrades those fields locally.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedding provider call failed or returned an unusable response
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error came from the startup configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
