//! Application configuration loaded from TOML.
//!
//! ```toml
//! [engine]
//! max_concurrency = 4
//!
//! [engine.rate_limits]
//! pubmed = 3
//!
//! [catalog]
//! path = "/etc/medsearch/sources.json"
//! ```

use std::path::{Path, PathBuf};

use medsearch_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{MedSearchError, Result};

/// Where the source catalog comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog file. The built-in catalog is used when unset.
    pub path: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedSearchConfig {
    /// Orchestrator and provider settings.
    pub engine: EngineConfig,
    /// Source catalog settings.
    pub catalog: CatalogConfig,
}

impl MedSearchConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, cannot be parsed, or
    /// fails engine validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| MedSearchError::Config(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise from [`Self::default_config_path`]
    /// when that file exists, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default_path = Self::default_config_path();
        if default_path.is_file() {
            tracing::debug!(path = %default_path.display(), "loading config");
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MedSearchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_dir().join("config.toml")
    }
}
