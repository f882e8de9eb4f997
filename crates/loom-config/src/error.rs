//! Configuration error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a config file
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// TOML content failed to deserialize
    #[cfg(feature = "toml")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON content failed to deserialize
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension does not map to a supported format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Type aliases refer to each other in a loop
    #[error("Alias cycle detected: {}", chain.join(" -> "))]
    AliasCycle {
        /// Aliases visited before the loop closed
        chain: Vec<String>,
    },

    /// The tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Specialized Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
