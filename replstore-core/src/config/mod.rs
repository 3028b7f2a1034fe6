//! Configuration management for replstore
//!
//! Defaults, overridden by a TOML file or by `REPLSTORE_<SECTION>_<KEY>`
//! environment variables, then validated as a whole.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core_store::{
    BackendKind, BackendOptions, StoreOptions, StoreRole, DEFAULT_MAX_PENDING_QUERIES,
    DEFAULT_RESYNC_INTERVAL,
};
use crate::core_transport::TransportConfig;
use crate::logging::LogLevel;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults applied to every store handle opened by the application
    pub store: StoreDefaults,

    pub transport: TransportConfig,

    pub logging: LoggingConfig,
}

/// Store handle defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDefaults {
    /// Backend for owners and replicas
    pub backend: BackendKind,

    /// Database file when `backend = "sqlite"`. In-memory when unset.
    pub sqlite_path: Option<PathBuf>,

    #[serde(with = "humantime_serde")]
    pub resync_interval: Duration,

    pub max_pending_queries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    pub json_format: bool,

    pub with_timestamp: bool,

    pub with_target: bool,
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            sqlite_path: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            max_pending_queries: DEFAULT_MAX_PENDING_QUERIES,
        }
    }
}

impl StoreDefaults {
    /// Options for opening a handle in `role`.
    ///
    /// Remote views get no backend settings, since they keep no local data.
    pub fn store_options(&self, role: StoreRole) -> StoreOptions {
        let options = StoreOptions::new()
            .with_resync_interval(self.resync_interval)
            .with_max_pending_queries(self.max_pending_queries);

        if !role.has_local_data() {
            return options;
        }

        let options = options.with_backend(self.backend);
        match (self.backend, &self.sqlite_path) {
            (BackendKind::Sqlite, Some(path)) => {
                options.with_backend_options(BackendOptions::sqlite(path.clone()))
            }
            _ => options,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue { key: key.to_string(), reason: e.to_string() })
}

fn parse_duration(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw)
        .map_err(|e| ConfigError::InvalidValue { key: key.to_string(), reason: e.to_string() })
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: REPLSTORE_<SECTION>_<KEY>
    /// Example: REPLSTORE_STORE_RESYNC_INTERVAL=500ms
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Store defaults
        if let Some(raw) = var("REPLSTORE_STORE_BACKEND") {
            config.store.backend = match raw.to_lowercase().as_str() {
                "memory" => BackendKind::Memory,
                "sqlite" => BackendKind::Sqlite,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "REPLSTORE_STORE_BACKEND".to_string(),
                        reason: format!("unknown backend '{}'", other),
                    })
                }
            };
        }
        if let Some(path) = var("REPLSTORE_STORE_SQLITE_PATH") {
            config.store.sqlite_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = var("REPLSTORE_STORE_RESYNC_INTERVAL") {
            config.store.resync_interval = parse_duration("REPLSTORE_STORE_RESYNC_INTERVAL", &raw)?;
        }
        if let Some(raw) = var("REPLSTORE_STORE_MAX_PENDING_QUERIES") {
            config.store.max_pending_queries =
                parse_var("REPLSTORE_STORE_MAX_PENDING_QUERIES", &raw)?;
        }

        // Transport
        if let Some(raw) = var("REPLSTORE_TRANSPORT_LATENCY") {
            config.transport.latency = parse_duration("REPLSTORE_TRANSPORT_LATENCY", &raw)?;
        }
        if let Some(raw) = var("REPLSTORE_TRANSPORT_UPDATE_BUFFER") {
            config.transport.update_buffer = parse_var("REPLSTORE_TRANSPORT_UPDATE_BUFFER", &raw)?;
        }

        // Logging
        if let Some(level) = var("REPLSTORE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(raw) = var("REPLSTORE_LOG_JSON") {
            config.logging.json_format = parse_var("REPLSTORE_LOG_JSON", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        let config: Self = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.resync_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "store.resync_interval must be greater than 0".to_string(),
            ));
        }

        if self.store.max_pending_queries == 0 {
            return Err(ConfigError::Invalid(
                "store.max_pending_queries must be greater than 0".to_string(),
            ));
        }

        if self.store.sqlite_path.is_some() && self.store.backend != BackendKind::Sqlite {
            return Err(ConfigError::Invalid(
                "store.sqlite_path set but backend is not sqlite".to_string(),
            ));
        }

        if self.transport.update_buffer == 0 || self.transport.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "transport buffers must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.parse::<LogLevel>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.resync_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.store.resync_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.sqlite_path = Some(PathBuf::from("/tmp/x.db"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = Config::from_vars(vars(&[
            ("REPLSTORE_STORE_RESYNC_INTERVAL", "500ms"),
            ("REPLSTORE_STORE_MAX_PENDING_QUERIES", "16"),
            ("REPLSTORE_TRANSPORT_LATENCY", "5ms"),
            ("REPLSTORE_LOG_LEVEL", "debug"),
            ("REPLSTORE_LOG_JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(config.store.resync_interval, Duration::from_millis(500));
        assert_eq!(config.store.max_pending_queries, 16);
        assert_eq!(config.transport.latency, Duration::from_millis(5));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_from_vars_invalid_value() {
        let err = Config::from_vars(vars(&[("REPLSTORE_STORE_RESYNC_INTERVAL", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "REPLSTORE_STORE_RESYNC_INTERVAL"));

        let err = Config::from_vars(vars(&[("REPLSTORE_STORE_BACKEND", "rocksdb")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("replstore.toml");

        let mut config = Config::default();
        config.store.backend = BackendKind::Sqlite;
        config.store.sqlite_path = Some(dir.path().join("store.db"));
        config.store.resync_interval = Duration::from_millis(250);
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_file_errors_name_the_path() {
        let dir = tempdir().unwrap();

        let missing = dir.path().join("absent.toml");
        let err = Config::from_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { ref path, .. } if path == &missing));
        assert!(err.to_string().contains("absent.toml"));

        let malformed = dir.path().join("bad.toml");
        std::fs::write(&malformed, "[store\nresync_interval = 1").unwrap();
        let err = Config::from_file(&malformed).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == &malformed));

        let unwritable = dir.path().join("no-such-dir").join("replstore.toml");
        let err = Config::default().save_to_file(&unwritable).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("replstore.toml");
        std::fs::write(&path, "[store]\nresync_interval = \"2s\"\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.store.resync_interval, Duration::from_secs(2));
        assert_eq!(loaded.store.max_pending_queries, DEFAULT_MAX_PENDING_QUERIES);
        assert_eq!(loaded.logging, LoggingConfig::default());
    }

    #[test]
    fn test_store_options_per_role() {
        let defaults = StoreDefaults {
            backend: BackendKind::Sqlite,
            sqlite_path: Some(PathBuf::from("/tmp/store.db")),
            ..Default::default()
        };

        let owner = defaults.store_options(StoreRole::Owner);
        assert_eq!(owner.backend_kind, Some(BackendKind::Sqlite));
        assert_eq!(owner.backend_options, Some(BackendOptions::sqlite("/tmp/store.db")));

        let view = defaults.store_options(StoreRole::RemoteView);
        assert_eq!(view.backend_kind, None);
        assert_eq!(view.backend_options, None);
        assert_eq!(view.resync_interval, DEFAULT_RESYNC_INTERVAL);
    }
}
