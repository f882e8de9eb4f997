//! Configuration structures for the Loom runtime
//!
//! Every section carries `#[serde(default)]`, so a config file only needs
//! to mention the values it overrides.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoomConfig {
    /// Runtime registries and propagation
    pub runtime: RuntimeConfig,
    /// Tree interpreter settings
    pub interpreter: InterpreterConfig,
    /// Handler language limits
    pub script: ScriptConfig,
    /// Auto-connect heuristic settings
    pub auto_connect: AutoConnectConfig,
    /// Logging setup
    pub logging: LoggingConfig,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of events kept in the recent history
    pub event_history_capacity: usize,
    /// Maximum nesting of explicit re-emissions within one triggering call
    pub max_emit_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_history_capacity: 100,
            max_emit_depth: 16,
        }
    }
}

/// Tree interpreter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Extra type aliases, `alias -> target`, applied before the built-in table
    pub aliases: BTreeMap<String, String>,
    /// Emit a user event's payload on the output point named after the event
    pub emit_event_points: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            emit_event_points: true,
        }
    }
}

/// Handler language configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Evaluation steps allowed per handler invocation
    pub max_steps: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { max_steps: 10_000 }
    }
}

/// Auto-connect heuristic configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConnectConfig {
    /// Apply auto-connect proposals when a tree is mounted
    pub enabled: bool,
    /// Allow `number -> text` proposals (wired through `toString`)
    pub allow_number_to_text: bool,
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_number_to_text: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for loom crates (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Extra `EnvFilter` directives, e.g. `loom_script=trace`
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
        }
    }
}

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl LoomConfig {
    /// Check ranges and alias consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.runtime.event_history_capacity == 0 {
            return Err(ConfigError::invalid(
                "runtime.event_history_capacity",
                "must be at least 1",
            ));
        }
        if self.runtime.max_emit_depth == 0 {
            return Err(ConfigError::invalid(
                "runtime.max_emit_depth",
                "must be at least 1",
            ));
        }
        if self.script.max_steps == 0 {
            return Err(ConfigError::invalid("script.max_steps", "must be at least 1"));
        }
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        self.interpreter.check_alias_cycles()
    }
}

impl InterpreterConfig {
    /// Aliases with lowercased keys, as the interpreter looks them up
    pub fn normalized_aliases(&self) -> BTreeMap<String, String> {
        self.aliases
            .iter()
            .map(|(alias, target)| (alias.trim().to_ascii_lowercase(), target.trim().to_string()))
            .collect()
    }

    /// Reject alias chains that loop back on themselves
    pub fn check_alias_cycles(&self) -> ConfigResult<()> {
        let aliases = self.normalized_aliases();
        for start in aliases.keys() {
            let mut seen = BTreeSet::new();
            let mut chain = vec![start.clone()];
            let mut current = start.clone();
            seen.insert(current.clone());
            while let Some(next) = aliases.get(&current) {
                let next = next.to_ascii_lowercase();
                if next == current {
                    // `x -> x` is a harmless self-mapping
                    break;
                }
                chain.push(next.clone());
                if !seen.insert(next.clone()) {
                    return Err(ConfigError::AliasCycle { chain });
                }
                current = next;
            }
        }
        Ok(())
    }
}
