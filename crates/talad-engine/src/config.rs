//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALAD_DB_PATH=/var/lib/talad/talad.db                              │
//! │     TALAD_DB_MAX_CONNECTIONS=8                                         │
//! │     TALAD_LOG=talad_engine=debug                                       │
//! │     TALAD_EVENT_CAPACITY=512                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/talad-promotions/engine.toml (Linux)                     │
//! │     ~/Library/Application Support/com.talad.promotions/engine.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/talad/talad.db"
//! max_connections = 5
//!
//! [engine]
//! event_channel_capacity = 256
//! default_page_size = 50
//! max_page_size = 200
//! alert_expiry_days = 7
//! high_usage_percent = 80
//!
//! [logging]
//! filter = "info,talad_engine=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use talad_core::alerts::AlertThresholds;
use talad_db::DbConfig;

const CONFIG_FILE: &str = "engine.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "talad", "promotions")
        .map(|dirs| dirs.data_dir().join("talad.db"))
        .unwrap_or_else(|| PathBuf::from("talad.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Buffered events per subscriber before the slowest one lags.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    /// Window for the "expiring soon" alert.
    #[serde(default = "default_alert_expiry_days")]
    pub alert_expiry_days: i64,

    /// Usage percent of the limit that raises the high-usage alert.
    #[serde(default = "default_high_usage_percent")]
    pub high_usage_percent: u32,
}

fn default_event_capacity() -> usize {
    256
}
fn default_page_size() -> u32 {
    talad_core::query::DEFAULT_PAGE_SIZE
}
fn default_max_page_size() -> u32 {
    crate::admin::DEFAULT_MAX_PAGE_SIZE
}
fn default_alert_expiry_days() -> i64 {
    7
}
fn default_high_usage_percent() -> u32 {
    80
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            event_channel_capacity: default_event_capacity(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            alert_expiry_days: default_alert_expiry_days(),
            high_usage_percent: default_high_usage_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives. `RUST_LOG` still wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml), skipped when missing
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads config or falls back to defaults when loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.engine.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.event_channel_capacity must be greater than 0".into(),
            ));
        }
        let page = self.engine.default_page_size;
        if page == 0 || page > self.engine.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "engine.default_page_size must be 1..={}, got {}",
                self.engine.max_page_size, self.engine.default_page_size
            )));
        }
        if self.engine.alert_expiry_days < 0 {
            return Err(ConfigError::Invalid(
                "engine.alert_expiry_days must not be negative".into(),
            ));
        }
        if !(1..=100).contains(&self.engine.high_usage_percent) {
            return Err(ConfigError::Invalid(format!(
                "engine.high_usage_percent must be 1..=100, got {}",
                self.engine.high_usage_percent
            )));
        }
        Ok(())
    }

    /// Applies `TALAD_*` overrides read through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("TALAD_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(raw) = var("TALAD_DB_MAX_CONNECTIONS") {
            match raw.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %raw, "Ignoring invalid TALAD_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(filter) = var("TALAD_LOG") {
            self.logging.filter = filter;
        }

        if let Some(raw) = var("TALAD_EVENT_CAPACITY") {
            match raw.parse::<usize>() {
                Ok(n) => self.engine.event_channel_capacity = n,
                Err(_) => warn!(value = %raw, "Ignoring invalid TALAD_EVENT_CAPACITY"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "talad", "promotions")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    pub fn alert_thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            expiring_within_days: self.engine.alert_expiry_days,
            high_usage_percent: self.engine.high_usage_percent,
            ..AlertThresholds::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.default_page_size, 50);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/promo.db\"\n\n[engine]\nhigh_usage_percent = 90\n",
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let config: EngineConfig = toml::from_str(&written).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/promo.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.engine.high_usage_percent, 90);
        assert_eq!(config.alert_thresholds().high_usage_percent, 90);
        assert_eq!(config.alert_thresholds().expiring_within_days, 7);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = EngineConfig::load_or_default(Some(path));
        assert_eq!(loaded.engine.default_page_size, 50);
        assert_eq!(loaded.engine.max_page_size, 200);
        assert_eq!(loaded.engine.alert_expiry_days, 7);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[engine\nmax_page_size = ").unwrap();

        let err = EngineConfig::load(Some(path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TALAD_DB_PATH", "/data/talad.db"),
            ("TALAD_DB_MAX_CONNECTIONS", "12"),
            ("TALAD_LOG", "debug"),
            ("TALAD_EVENT_CAPACITY", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/talad.db"));
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.engine.event_channel_capacity, 256);
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.engine.default_page_size = 500;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.engine.high_usage_percent = 0;
        assert!(config.validate().is_err());
    }
}
