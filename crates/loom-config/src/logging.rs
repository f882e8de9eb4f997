//! Tracing subscriber setup
//!
//! Builds an `EnvFilter` from [`LoggingConfig`] and installs a fmt subscriber.
//! Installation uses `try_init`, so a second call (or a subscriber installed
//! by the host application) is reported, not a panic.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ConfigError, ConfigResult};

const LOOM_CRATES: &[&str] = &["loom_config", "loom_core", "loom_script", "loom_render"];

/// Build the filter directive string for a logging config
pub fn filter_directives(config: &LoggingConfig) -> String {
    let level = config.level.to_ascii_lowercase();
    let mut directives: Vec<String> = LOOM_CRATES
        .iter()
        .map(|name| format!("{}={}", name, level))
        .collect();
    directives.extend(config.directives.iter().cloned());
    directives.join(",")
}

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> ConfigResult<()> {
    let filter = EnvFilter::try_new(filter_directives(config))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_cover_all_crates() {
        let config = LoggingConfig {
            level: "DEBUG".into(),
            directives: vec!["loom_script=trace".into()],
        };
        let directives = filter_directives(&config);
        assert!(directives.starts_with("loom_config=debug"));
        assert!(directives.contains("loom_render=debug"));
        assert!(directives.ends_with("loom_script=trace"));
    }

    #[test]
    fn test_second_init_does_not_panic() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
