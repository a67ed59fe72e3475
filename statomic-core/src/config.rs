//! Engine configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via STATOMIC_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-transition defaults.
    pub defaults: DefaultsConfig,
    /// Audit trail configuration.
    pub audit: AuditConfig,
}

impl EngineConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("STATOMIC_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.defaults.apply_env_overrides();
        self.audit.apply_env_overrides();
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sep = self.defaults.wildcard_separator;
        if sep == '*' || sep == '+' {
            return Err(ConfigError::ValidationError(format!(
                "wildcard_separator '{sep}' collides with a pattern token"
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Defaults applied to transitions that do not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Run transitions inside a unit of work unless the definition opts out.
    pub atomic: bool,
    /// Reject direct state assignment on fields that do not opt out.
    pub protected_fields: bool,
    /// Separator recognized by prefix source patterns such as `"WRK-*"`.
    pub wildcard_separator: char,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            atomic: true,
            protected_fields: false,
            wildcard_separator: '-',
        }
    }
}

impl DefaultsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(atomic) = std::env::var("STATOMIC_ATOMIC") {
            self.atomic = atomic == "1" || atomic.to_lowercase() == "true";
        }

        if let Ok(protected) = std::env::var("STATOMIC_PROTECTED_FIELDS") {
            self.protected_fields = protected == "1" || protected.to_lowercase() == "true";
        }

        if let Ok(sep) = std::env::var("STATOMIC_WILDCARD_SEPARATOR") {
            if let Some(c) = sep.chars().next() {
                self.wildcard_separator = c;
            }
        }
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record a transition event for every applied transition.
    pub enabled: bool,
    /// When the event becomes durable relative to the unit of work.
    pub mode: AuditMode,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AuditMode::Transaction,
        }
    }
}

impl AuditConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("STATOMIC_AUDIT_ENABLED") {
            self.enabled = enabled == "1" || enabled.to_lowercase() == "true";
        }

        if let Ok(mode) = std::env::var("STATOMIC_AUDIT_MODE") {
            match mode.to_lowercase().as_str() {
                "transaction" => self.mode = AuditMode::Transaction,
                "signal" => self.mode = AuditMode::Signal,
                _ => {}
            }
        }
    }

    /// Returns whether auditing is effectively disabled.
    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }
}

/// Timing of audit event writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Written inside the unit of work; exists iff the transition committed.
    Transaction,
    /// Written after commit, in the post-transition phase.
    Signal,
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
