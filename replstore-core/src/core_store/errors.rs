/*
    errors.rs - Error types for the store subsystem

    Covers:
    - open-time configuration errors (rejected synchronously, never retried)
    - backend and serialization failures
    - transport bookkeeping (unknown or already-terminated queries)

    Query-time failures are not errors: they reach the caller as a FAILURE
    QueryResult through the query callback.
*/

use thiserror::Error;

use super::role::StoreRole;
use crate::core_transport::QueryTicket;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend configuration given for a role that keeps no local data
    #[error("Store '{store_id}' opened as {role} cannot carry backend configuration")]
    BackendNotAllowed { store_id: String, role: StoreRole },

    /// Another participant already owns this store
    #[error("Store '{0}' already has an owner")]
    DuplicateOwner(String),

    /// Open options out of range
    #[error("Invalid store options: {0}")]
    InvalidOptions(String),

    /// Backend I/O or engine failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No outstanding query under this ticket
    #[error("No pending query for {0}")]
    UnknownQuery(QueryTicket),

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// True for errors that reject an `open` call outright
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StoreError::BackendNotAllowed { .. }
                | StoreError::DuplicateOwner(_)
                | StoreError::InvalidOptions(_)
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::DuplicateOwner("cache1".to_string());
        assert_eq!(err.to_string(), "Store 'cache1' already has an owner");
    }

    #[test]
    fn test_backend_not_allowed_display() {
        let err = StoreError::BackendNotAllowed {
            store_id: "cache1".to_string(),
            role: StoreRole::RemoteView,
        };
        assert!(err.to_string().contains("cache1"));
        assert!(err.to_string().contains("remote-view"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(StoreError::DuplicateOwner("x".into()).is_configuration());
        assert!(StoreError::InvalidOptions("x".into()).is_configuration());
        assert!(!StoreError::Backend("x".into()).is_configuration());
        assert!(!StoreError::UnknownQuery(QueryTicket::from_raw(1)).is_configuration());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let store_err: StoreError = json_err.into();
        assert!(matches!(store_err, StoreError::Serialization(_)));
    }
}
