// Configuration management for the replay simulator

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub ticker: String,
    /// Number of displayed levels per side in the historical snapshots
    #[serde(default = "default_n_levels")]
    pub n_levels: usize,
    /// Depth proportion (outer_levels / n_levels) that triggers an outer-level resync
    #[serde(default = "default_outer_levels")]
    pub outer_levels: usize,
    /// Replay granularity used by the CLI driver
    #[serde(default = "default_step_seconds")]
    pub step_seconds: u64,
    /// Oldest acceptable starting snapshot, relative to the episode start
    #[serde(default = "default_max_snapshot_age_secs")]
    pub max_snapshot_age_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub log_resyncs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_n_levels() -> usize { 5 }
fn default_outer_levels() -> usize { 5 }
fn default_step_seconds() -> u64 { 1 }
fn default_max_snapshot_age_secs() -> i64 { 86_400 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ticker: "MSFT".to_string(),
            n_levels: default_n_levels(),
            outer_levels: default_outer_levels(),
            step_seconds: default_step_seconds(),
            max_snapshot_age_secs: default_max_snapshot_age_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_resyncs: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn max_snapshot_age(&self) -> Duration {
        Duration::seconds(self.max_snapshot_age_secs)
    }

    pub fn step(&self) -> Duration {
        Duration::seconds(self.step_seconds as i64)
    }

    /// Validate simulator settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticker.trim().is_empty() {
            return Err(ConfigError::Validation("ticker must not be empty".to_string()));
        }

        if self.n_levels == 0 {
            return Err(ConfigError::Validation("n_levels must be greater than 0".to_string()));
        }

        if self.outer_levels > self.n_levels {
            return Err(ConfigError::Validation(format!(
                "outer_levels ({}) must not exceed n_levels ({})",
                self.outer_levels, self.n_levels
            )));
        }

        if self.step_seconds == 0 {
            return Err(ConfigError::Validation("step_seconds must be greater than 0".to_string()));
        }

        if self.max_snapshot_age_secs <= 0 {
            return Err(ConfigError::Validation("max_snapshot_age_secs must be positive".to_string()));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulator.validate()?;

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Validation(format!("unknown log level '{}'", other))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulator.max_snapshot_age(), Duration::days(1));
    }

    #[test]
    fn test_outer_levels_bounded_by_n_levels() {
        let mut config = Config::default();
        config.simulator.outer_levels = 6;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[simulator]\nticker = \"AAPL\"\n").unwrap();
        assert_eq!(config.simulator.ticker, "AAPL");
        assert_eq!(config.simulator.n_levels, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
