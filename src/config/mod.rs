//! Configuration management for docpager
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::listener::{DEFAULT_SETTLE_EMISSIONS, SettlePolicy};

/// Prefix of the environment variables read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "DOCPAGER_";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Paging configuration
    #[serde(default)]
    pub paging: PagingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Demo data configuration
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Paging-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Number of documents requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Snapshot emissions after which a page listener settles
    #[serde(default = "default_settle_emissions")]
    pub settle_emissions: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Demo data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of documents seeded into the demo store
    #[serde(default = "default_documents")]
    pub documents: usize,

    /// Collection holding the demo documents
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Answer every new listener twice (cache, then server)
    #[serde(default)]
    pub double_delivery: bool,
}

// Default value functions
fn default_page_size() -> usize {
    20
}

fn default_settle_emissions() -> usize {
    DEFAULT_SETTLE_EMISSIONS
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

fn default_documents() -> usize {
    12
}

fn default_collection() -> String {
    "items".to_string()
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            settle_emissions: default_settle_emissions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            documents: default_documents(),
            collection: default_collection(),
            double_delivery: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::FileNotFound(path.display().to_string()).into(),
            _ => crate::error::DocpagerError::Io(e),
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from multiple sources with proper precedence
    ///
    /// An explicit `path` must exist; otherwise the default path is used
    /// when present.
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override fields from variables resolved through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, value)) = var("PAGE_SIZE") {
            self.paging.page_size = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("SETTLE_EMISSIONS") {
            self.paging.settle_emissions = parse_value(&name, &value)?;
        }
        if let Some((name, value)) = var("LOG_LEVEL") {
            self.logging.level = parse_value(&name, &value)?;
        }
        if let Some((_, value)) = var("COLLECTION") {
            self.demo.collection = value;
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docpager")
            .join("config.toml")
    }

    /// Save configuration to a file
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.paging.page_size == 0 {
            return Err(invalid_value("paging.page_size", "0"));
        }
        if self.paging.settle_emissions == 0 {
            return Err(invalid_value("paging.settle_emissions", "0"));
        }
        if self.demo.collection.trim().is_empty() {
            return Err(ConfigError::MissingField("demo.collection".to_string()).into());
        }
        Ok(())
    }

    /// Settle policy for page listeners
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy::new(self.paging.settle_emissions)
    }
}

fn invalid_value(field: &str, value: &str) -> crate::error::DocpagerError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_value(name, value))
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.paging.page_size, 20);
        assert_eq!(config.settle_policy().emissions(), 2);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[paging]\npage_size = 5\n").unwrap();
        assert_eq!(config.paging.page_size, 5);
        assert_eq!(config.paging.settle_emissions, 2);
        assert_eq!(config.demo.collection, "items");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCPAGER_PAGE_SIZE", "7"),
            ("DOCPAGER_SETTLE_EMISSIONS", "3"),
            ("DOCPAGER_LOG_LEVEL", "debug"),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|name| vars.get(name).map(|value| value.to_string()))
            .unwrap();

        assert_eq!(config.paging.page_size, 7);
        assert_eq!(config.paging.settle_emissions, 3);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = Config::default();
        let result = config.apply_env(|name| {
            (name == "DOCPAGER_PAGE_SIZE").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.paging.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join(format!("docpager-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.demo.documents = 3;

        config.save(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(
            err,
            crate::error::DocpagerError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
