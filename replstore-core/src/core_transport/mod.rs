/*
    core_transport - the replication/transport collaborator seam

    A StoreHandle never talks to the network itself. It asks a StoreTransport
    for a connection matching its role, then hands every query to that
    connection together with the QueryCallback that must eventually be
    completed or aborted.

    Contract with implementations:
    - `open_connection` rejects configuration that cannot be honoured (a second
      owner for the same store id) synchronously.
    - every callback passed to `submit_query` is terminated exactly once, from
      whatever execution context the transport runs in.
    - replicas re-synchronize every `resync_interval` while their update stream
      is interrupted.

    `memory` provides an in-process implementation.
*/

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::core_query::QueryCallback;
use crate::core_store::{BackendKind, BackendOptions, StoreId, StoreResult, StoreRole};

pub mod events;
pub mod memory;
pub mod pending;

pub use events::TransportEvent;
pub use memory::{MemoryTransport, TransportConfig};
pub use pending::{PendingQueries, PendingQuery, QueryTicket};

/// A read query against a store
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Value stored under a key. Absent keys answer with FAILURE.
    Lookup(Value),
    /// Whether a key is present, as a boolean
    Exists(Value),
    /// Number of entries
    Size,
}

impl Query {
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Lookup(_) => "lookup",
            Query::Exists(_) => "exists",
            Query::Size => "size",
        }
    }
}

/// What a handle asks of the transport when it opens
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub store_id: StoreId,
    pub role: StoreRole,
    pub backend_kind: Option<BackendKind>,
    pub backend_options: Option<BackendOptions>,
    pub resync_interval: Duration,
}

/// Opens role-specific connections to stores
#[async_trait]
pub trait StoreTransport: Send + Sync {
    async fn open_connection(
        &self,
        request: ConnectionRequest,
    ) -> StoreResult<Box<dyn StoreConnection>>;
}

/// A handle's link to its store. Dropping it detaches the handle.
pub trait StoreConnection: Send + Sync {
    fn store_id(&self) -> &StoreId;

    fn role(&self) -> StoreRole;

    /// Run `query`, eventually terminating `callback` exactly once
    fn submit_query(&self, query: Query, callback: QueryCallback);
}
