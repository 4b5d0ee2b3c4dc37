//! Common error types for playlift

use thiserror::Error;

/// Common result type for playlift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the catalog clients and the transfer pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure (connect, DNS, protocol)
    #[error("Network error: {0}")]
    Network(String),

    /// External call exceeded its bounded timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP response from a catalog API
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Catalog API signalled throttling (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Response body did not match the expected wire shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bearer credential is absent
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The playlist selection could not be resolved
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The progress stream consumer disconnected
    #[error("Event stream closed by consumer")]
    StreamClosed,
}

impl Error {
    /// Transient failures are retried with bounded backoff at the catalog
    /// client boundary; everything else is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) | Error::RateLimited => true,
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}
