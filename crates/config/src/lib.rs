//! Configuration loading, validation, and management for CampusPilot.
//!
//! Loads configuration from `~/.campuspilot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.campuspilot/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversation engine settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// When the engine looks for tool calls in a model's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolScan {
    /// Stop the stream as soon as a complete tool call arrives
    #[default]
    EarlyExit,
    /// Read the whole stream, then look for tool calls
    EndOfStream,
}

impl std::str::FromStr for ToolScan {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "early_exit" => Ok(Self::EarlyExit),
            "end_of_stream" => Ok(Self::EndOfStream),
            other => Err(ConfigError::ValidationError(format!(
                "unknown tool_scan mode '{other}' (expected early_exit or end_of_stream)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Turns allowed before a final answer is forced
    #[serde(default = "default_step_limit")]
    pub step_limit: u32,

    #[serde(default)]
    pub tool_scan: ToolScan,

    /// Whole-run deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,

    /// Overrides the built-in "suggest a title" instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_instruction: Option<String>,

    /// Overrides the built-in "answer now" directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer_directive: Option<String>,
}

fn default_step_limit() -> u32 {
    150
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            step_limit: default_step_limit(),
            tool_scan: ToolScan::default(),
            run_timeout_secs: None,
            title_instruction: None,
            final_answer_directive: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.campuspilot/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CAMPUSPILOT_STEP_LIMIT`
    /// - `CAMPUSPILOT_TOOL_SCAN`
    /// - `CAMPUSPILOT_LOG_LEVEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(limit) = lookup("CAMPUSPILOT_STEP_LIMIT") {
            self.agent.step_limit = limit.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "CAMPUSPILOT_STEP_LIMIT must be a positive integer, got '{limit}'"
                ))
            })?;
        }

        if let Some(mode) = lookup("CAMPUSPILOT_TOOL_SCAN") {
            self.agent.tool_scan = mode.parse()?;
        }

        if let Some(level) = lookup("CAMPUSPILOT_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".campuspilot")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.step_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.step_limit must be at least 1".into(),
            ));
        }

        if self.agent.run_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.run_timeout_secs must be greater than 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
