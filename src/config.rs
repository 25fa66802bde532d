//! Store configuration.
//!
//! A [`StoreConfig`] picks the backend and the default project and
//! namespace. It can be built in code or read from TOML:
//!
//! ```toml
//! backend = "docstore"
//! project_id = "inventory"
//! namespace = "tenant-a"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which backend a store runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hierarchical-key store
    #[default]
    Datastore,
    /// Document store
    Docstore,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Datastore => f.write_str("datastore"),
            BackendKind::Docstore => f.write_str("docstore"),
        }
    }
}

/// Options for opening a store.
///
/// ```
/// use canonstore::{BackendKind, StoreConfig};
///
/// let config = StoreConfig::new()
///     .backend(BackendKind::Docstore)
///     .project_id("inventory");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend to open
    pub backend: BackendKind,
    /// Default project for keys and queries
    pub project_id: String,
    /// Default namespace; empty for none
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Datastore,
            project_id: "default".to_string(),
            namespace: String::new(),
        }
    }
}

impl StoreConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the default project.
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Set the default namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: StoreConfig =
            toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: StoreConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.display().to_string()),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.project_id.is_empty() {
            return Err(ConfigError::Validation {
                field: "project_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
