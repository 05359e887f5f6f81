//! # Till Configuration
//!
//! Runtime settings for binaries built on till-db.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_DB_MAX_CONNECTIONS=8                                          │
//! │     TILL_DB_BUSY_TIMEOUT_MS=5000                                       │
//! │     TILL_LOG=info,till=debug                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     explicit --config path, or                                         │
//! │     ~/.config/till-pos/till.toml (Linux)                               │
//! │     ~/Library/Application Support/com.till.pos/till.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./till.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [logging]
//! filter = "info,till=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pool::DbConfig;

// =============================================================================
// Errors
// =============================================================================

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

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub busy_timeout_ms: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("./till.db"),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
            busy_timeout_ms: 5_000,
            run_migrations: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: "info,till=debug,sqlx=warn".to_string(),
        }
    }
}

// =============================================================================
// Till Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TillConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl TillConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml), when it exists
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading till config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections and keys take defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
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
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }
        if EnvFilter::try_new(&self.logging.filter).is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.filter is not a valid filter: {}",
                self.logging.filter
            )));
        }
        Ok(())
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .run_migrations(self.database.run_migrations)
    }

    /// Installs the global tracing subscriber. `RUST_LOG` wins over the
    /// configured filter. Safe to call more than once.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.filter));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("TILL_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TILL_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(ms) = std::env::var("TILL_DB_BUSY_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(n) => self.database.busy_timeout_ms = n,
                Err(_) => warn!(value = %ms, "Ignoring invalid TILL_DB_BUSY_TIMEOUT_MS"),
            }
        }

        if let Ok(filter) = std::env::var("TILL_LOG") {
            self.logging.filter = filter;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TillConfig::from_toml(
            r#"
            [database]
            path = "/tmp/till-test.db"
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/till-test.db"));
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_db_config_conversion() {
        let mut config = TillConfig::default();
        config.database.max_connections = 8;
        config.database.busy_timeout_ms = 1_500;

        let db = config.db_config();
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.busy_timeout, Duration::from_millis(1_500));
        assert!(db.run_migrations);
    }

    #[test]
    fn test_validate_rejects_bad_pool_sizes() {
        let mut config = TillConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = TillConfig::default();
        config.database.min_connections = 9;
        assert!(config.validate().is_err());

        assert!(TillConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("till.toml");
        std::fs::write(&path, "[logging]\nfilter = \"warn\"\n").unwrap();

        let config = TillConfig::load(Some(path)).unwrap();
        // TILL_LOG may be set in the environment running the tests
        if std::env::var("TILL_LOG").is_err() {
            assert_eq!(config.logging.filter, "warn");
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let err = TillConfig::from_toml("[database\npath = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
