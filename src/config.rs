//! Configuration management for botlog

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A named level registered on top of DEBUG/WARNING/ERROR
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomLevel {
    /// Numeric level; 0 is reserved
    pub level: i32,
    /// Display name used in console and parseable output
    pub name: String,
}

impl CustomLevel {
    pub fn new(level: i32, name: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Interval of the periodic flush in milliseconds; 0 disables the timer
    #[serde(default = "default_flush_period_ms")]
    pub flush_period_ms: u64,

    /// Print non-hardware levels to stdout
    #[serde(default = "default_true")]
    pub stdout_enabled: bool,

    /// Send hardware-channel warnings and errors to the driver station
    #[serde(default = "default_true")]
    pub hardware_enabled: bool,

    /// Attach a stack trace to every message (costly on hot paths)
    #[serde(default = "default_true")]
    pub capture_stack_traces: bool,

    /// Innermost frames left out of captured stack traces
    #[serde(default = "default_stack_depth")]
    pub stack_depth: usize,

    /// Path segment where console file names are cut
    #[serde(default = "default_project_marker")]
    pub project_marker: String,

    /// Log file retention in days (default: 7)
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Directory for log files; defaults to ~/.botlog/logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_dir: Option<PathBuf>,

    /// Extra levels to register at startup
    #[serde(default)]
    pub custom_levels: Vec<CustomLevel>,
}

fn default_flush_period_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_stack_depth() -> usize {
    3
}

fn default_project_marker() -> String {
    "wpilib".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_period_ms: default_flush_period_ms(),
            stdout_enabled: true,
            hardware_enabled: true,
            capture_stack_traces: true,
            stack_depth: default_stack_depth(),
            project_marker: default_project_marker(),
            retention_days: default_retention_days(),
            logs_dir: None,
            custom_levels: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return defaults if it is missing
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or return defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Periodic flush interval, `None` when the timer is disabled
    pub fn flush_period(&self) -> Option<Duration> {
        (self.flush_period_ms > 0).then(|| Duration::from_millis(self.flush_period_ms))
    }

    /// Directory for log files
    pub fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone().unwrap_or_else(logs_dir)
    }

    /// Add a custom level, rejecting the reserved level and duplicates
    pub fn add_level(&mut self, level: CustomLevel) -> Result<()> {
        if level.level == crate::logging::RESERVED {
            anyhow::bail!("Level 0 is reserved");
        }
        if self.custom_levels.iter().any(|l| l.level == level.level) {
            anyhow::bail!("Level {} is already configured", level.level);
        }
        self.custom_levels.push(level);
        Ok(())
    }
}

/// Get the base configuration directory (~/.botlog)
/// Falls back to ./.botlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".botlog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".botlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the default logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure the configuration and logs directories exist
pub fn ensure_directories(config: &Config) -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(config.logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}
