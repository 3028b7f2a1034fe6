/*
    options.rs - Open-time configuration for a store handle

    Backend selection and options only matter for roles that keep local data
    (owner, replica). A remote view carrying any of them is rejected at open.
    Backend options are otherwise passed through untouched.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::errors::{StoreError, StoreResult};
use super::role::{StoreId, StoreRole};

/// How often a replica re-synchronizes while its update stream is down
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Outstanding queries allowed per handle before new ones are aborted
pub const DEFAULT_MAX_PENDING_QUERIES: usize = 1024;

/// Physical storage backend for owners and replicas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// SQLite backend settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SqliteOptions {
    /// Database file. In-memory database when absent.
    pub path: Option<PathBuf>,
}

/// Per-backend option records
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendOptions {
    #[serde(default)]
    pub sqlite: Option<SqliteOptions>,
}

impl BackendOptions {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        BackendOptions { sqlite: Some(SqliteOptions { path: Some(path.into()) }) }
    }
}

/// Options for opening a store handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Backend for local data. Memory when unset.
    pub backend_kind: Option<BackendKind>,

    /// Options passed through to the backend
    pub backend_options: Option<BackendOptions>,

    /// Replica re-synchronization period while the update stream is down
    #[serde(with = "humantime_serde")]
    pub resync_interval: Duration,

    /// Bound on outstanding queries for the handle
    pub max_pending_queries: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            backend_kind: None,
            backend_options: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            max_pending_queries: DEFAULT_MAX_PENDING_QUERIES,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set backend kind
    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend_kind = Some(kind);
        self
    }

    /// Builder: set backend options
    pub fn with_backend_options(mut self, options: BackendOptions) -> Self {
        self.backend_options = Some(options);
        self
    }

    /// Builder: set resync interval
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Builder: set the outstanding query bound
    pub fn with_max_pending_queries(mut self, max: usize) -> Self {
        self.max_pending_queries = max;
        self
    }

    /// Backend to instantiate for roles with local data
    pub fn effective_backend(&self) -> BackendKind {
        self.backend_kind.unwrap_or_default()
    }

    /// Check the options against the role they are opened with
    pub fn validate(&self, id: &StoreId, role: StoreRole) -> StoreResult<()> {
        if !role.has_local_data() && (self.backend_kind.is_some() || self.backend_options.is_some())
        {
            return Err(StoreError::BackendNotAllowed { store_id: id.to_string(), role });
        }

        if self.resync_interval.is_zero() {
            return Err(StoreError::InvalidOptions(
                "resync_interval must be greater than 0".to_string(),
            ));
        }

        if self.max_pending_queries == 0 {
            return Err(StoreError::InvalidOptions(
                "max_pending_queries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
