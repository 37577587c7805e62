use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Failed to read config file '{path}': {source}")]
  Read {
    path: String,
    source: std::io::Error,
  },
  #[error("Failed to parse config file '{path}': {source}")]
  Parse {
    path: String,
    source: toml::de::Error,
  },
  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// Log configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
  /// Log file path, if not set, logs will be printed to stdout
  pub file: Option<String>,
  /// Log level, default is "info"
  #[serde(default = "default_log_level")]
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: default_log_level(),
    }
  }
}

/// Hero web API configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
  /// Address the mock web API listens on, and the one clients dial
  #[serde(default = "default_server_addr")]
  pub server_addr: String,

  /// Path the hero collection is mounted at
  #[serde(default = "default_base_path")]
  pub base_path: String,

  /// Simulated round-trip delay before each response, in milliseconds
  #[serde(default)]
  pub latency_ms: u64,

  /// Log configuration
  #[serde(default)]
  pub log: LogConfig,
}

fn default_server_addr() -> String {
  "127.0.0.1:4280".to_string()
}

fn default_base_path() -> String {
  "/api/heroes".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      server_addr: default_server_addr(),
      base_path: default_base_path(),
      latency_ms: 0,
      log: LogConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from TOML file
  pub fn from_file(path: &str) -> Result<Self, ConfigError> {
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_string(),
      source,
    })?;

    let config: Config = toml::from_str(&config_str).map_err(|source| ConfigError::Parse {
      path: path.to_string(),
      source,
    })?;

    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.base_path.starts_with('/') {
      return Err(ConfigError::Invalid(format!(
        "base_path '{}' must start with '/'",
        self.base_path
      )));
    }
    if self.server_addr.is_empty() {
      return Err(ConfigError::Invalid("server_addr is empty".to_string()));
    }
    Ok(())
  }
}
