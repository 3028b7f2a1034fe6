//! Store identity and replication roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable name used to address a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        StoreId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreId {
    fn from(id: &str) -> Self {
        StoreId::new(id)
    }
}

impl From<String> for StoreId {
    fn from(id: String) -> Self {
        StoreId(id)
    }
}

/// A participant's relationship to a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreRole {
    /// No local data; queries are forwarded to the owner
    RemoteView,
    /// Authoritative master copy
    Owner,
    /// Local copy kept in sync with the owner
    Replica,
}

impl StoreRole {
    /// Whether this role keeps a local backend
    pub fn has_local_data(&self) -> bool {
        matches!(self, StoreRole::Owner | StoreRole::Replica)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreRole::RemoteView => "remote-view",
            StoreRole::Owner => "owner",
            StoreRole::Replica => "replica",
        }
    }
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote-view" | "remote_view" | "frontend" => Ok(StoreRole::RemoteView),
            "owner" | "master" => Ok(StoreRole::Owner),
            "replica" | "clone" => Ok(StoreRole::Replica),
            other => Err(format!("unknown store role '{}'", other)),
        }
    }
}
