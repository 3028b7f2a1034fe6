//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("Cannot write config file {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("Malformed config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("Cannot encode config as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    /// An environment override that does not parse
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// Settings that parse but cannot be used together
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
