//! Logging subsystem for replstore
//!
//! A thin setup layer over `tracing-subscriber`. `RUST_LOG` overrides the
//! configured level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info, with_timestamp: true, with_target: true, json_format: false }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self { level, ..Default::default() }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(settings: &LoggingConfig) -> Result<Self, Self::Error> {
        Ok(LogConfig::new(settings.level.parse()?)
            .with_timestamp(settings.with_timestamp)
            .with_target(settings.with_target)
            .json_format(settings.json_format))
    }
}

/// Initialize logging at `info`, human-readable output
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging from the `[logging]` section of the application config
pub fn init_logging_from_config(settings: &LoggingConfig) -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::try_from(settings)?)
}

/// Initialize logging with an explicit configuration.
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use replstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).with_target(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let target = config.with_target;
    let fmt_layer = match (config.json_format, config.with_timestamp) {
        (true, true) => fmt::layer().json().with_target(target).boxed(),
        (true, false) => fmt::layer().json().without_time().with_target(target).boxed(),
        (false, true) => fmt::layer().with_target(target).boxed(),
        (false, false) => fmt::layer().without_time().with_target(target).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
