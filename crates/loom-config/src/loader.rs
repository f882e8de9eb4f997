//! Config loading from strings and files
//!
//! The format is picked from the file extension: `.toml` (with the `toml`
//! feature) or `.json`. Loaded configs are validated before being returned.

use std::path::Path;
use tracing::{debug, info};

use crate::config::LoomConfig;
use crate::error::{ConfigError, ConfigResult};

/// Loads [`LoomConfig`] values
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse and validate a TOML document
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> ConfigResult<LoomConfig> {
        let config: LoomConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> ConfigResult<LoomConfig> {
        let config: LoomConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format from its extension
    pub async fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<LoomConfig> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading config file");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config = match extension.as_str() {
            #[cfg(feature = "toml")]
            "toml" => Self::from_toml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load a config file if a path is given, defaults otherwise
    pub async fn load_or_default(path: Option<&Path>) -> ConfigResult<LoomConfig> {
        match path {
            Some(path) => Self::load_from_file(path).await,
            None => Ok(LoomConfig::default()),
        }
    }
}
