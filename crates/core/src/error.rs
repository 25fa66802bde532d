//! Error type shared by every canonstore crate.
//!
//! There is one conversion/validation error kind. Anything the
//! model or a converter refuses becomes [`Error::InvalidRequest`]; failures
//! raised by a backend client are carried in [`Error::Backend`] untouched.

use thiserror::Error;

/// All canonstore errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid request or conversion failure.
    ///
    /// Raised for unknown value tags, keys missing an id/name where a
    /// complete key is required, missing properties, out-of-range values,
    /// and operations the active backend cannot represent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure reported by a backend client.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for canonstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::InvalidRequest`] from any message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    /// Wrap a backend client error without reinterpreting it.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend(Box::new(err))
    }

    /// Check if this is an invalid-request error.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }

    /// Check if this error came from a backend client.
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend(_))
    }
}
