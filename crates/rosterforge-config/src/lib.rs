//! Configuration system for RosterForge.
//!
//! Load engine configuration from TOML or YAML to control invariant
//! checking and the auto-check walk without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use rosterforge_config::EngineConfig;
//! use rosterforge_core::AssertMode;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     assert_mode = "full"
//!     log_filter = "rosterforge_scope=debug"
//!
//!     [auto_check]
//!     allow_remove_units = true
//!     yield_every = 8
//! "#).unwrap();
//!
//! assert_eq!(config.assert_mode, AssertMode::Full);
//! assert!(config.auto_check.enabled);
//! assert!(config.auto_check.allow_remove_units);
//! assert_eq!(config.auto_check.yield_every, 8);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use rosterforge_config::EngineConfig;
//!
//! let config = EngineConfig::load("rosterforge.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::path::Path;

use rosterforge_core::AssertMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// How aggressively lifecycle and aggregation invariants are checked.
    #[serde(default)]
    pub assert_mode: AssertMode,

    /// Auto-check walk settings.
    #[serde(default)]
    pub auto_check: AutoCheckConfig,

    /// `EnvFilter` directives for the console subscriber.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl EngineConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file, picking the format from its
    /// extension. Anything other than `.yaml`/`.yml` is read as TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, fails to parse, or holds
    /// values that fail [`EngineConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auto_check.yield_every == 0 {
            return Err(ConfigError::Invalid(
                "auto_check.yield_every must be at least 1".to_string(),
            ));
        }
        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::Invalid("log_filter is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Sets the assertion level.
    pub fn with_assert_mode(mut self, mode: AssertMode) -> Self {
        self.assert_mode = mode;
        self
    }

    /// Replaces the auto-check settings.
    pub fn with_auto_check(mut self, auto_check: AutoCheckConfig) -> Self {
        self.auto_check = auto_check;
        self
    }

    /// Sets the console log filter.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }
}

/// Auto-check walk configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AutoCheckConfig {
    /// Whether auto-check runs at all.
    pub enabled: bool,

    /// Lets "remove others" zero sibling top-level units.
    pub allow_remove_units: bool,

    /// Leaves hidden options alone when filling groups.
    pub skip_hidden: bool,

    /// Async walk yields after this many sibling subtrees.
    pub yield_every: usize,
}

impl Default for AutoCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_remove_units: false,
            skip_hidden: true,
            yield_every: 1,
        }
    }
}

impl AutoCheckConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_allow_remove_units(mut self, allow: bool) -> Self {
        self.allow_remove_units = allow;
        self
    }

    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    pub fn with_yield_every(mut self, every: usize) -> Self {
        self.yield_every = every;
        self
    }
}

#[cfg(test)]
mod tests;
