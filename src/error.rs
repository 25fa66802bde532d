//! Error types for canonstore.
//!
//! Store operations return the core [`Error`]: `InvalidRequest` for anything
//! the caller can fix, `Backend` for client failures passed through
//! unchanged. Loading a configuration file has its own [`ConfigError`], which
//! folds into `InvalidRequest` when a store is opened from a file.

use std::io;
use thiserror::Error;

pub use canonstore_core::{Error, Result};

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Config text is not valid TOML for [`StoreConfig`](crate::StoreConfig)
    #[error("failed to parse config{}: {source}", location(.path))]
    Parse {
        /// Path, when parsed from a file
        path: Option<String>,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A field holds an unusable value
    #[error("invalid value for '{field}': {message}")]
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },
}

fn location(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" at {}", path),
        None => String::new(),
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::invalid_request(e.to_string())
    }
}
