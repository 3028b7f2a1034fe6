//! Observable transport activity

use tokio::time::Instant;

use crate::core_store::StoreId;

/// Events emitted by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A participant became the owner of a store
    OwnerRegistered { store_id: StoreId },
    /// The owner detached
    OwnerUnregistered { store_id: StoreId },
    /// The store's update stream went down
    StreamInterrupted { store_id: StoreId },
    /// The store's update stream came back
    StreamRestored { store_id: StoreId },
    /// A replica tried to re-synchronize with the owner
    ResyncAttempt { store_id: StoreId, attempt: u64, at: Instant },
    /// A replica replaced its contents with an owner snapshot
    SnapshotApplied { store_id: StoreId, entries: usize },
}

impl TransportEvent {
    pub fn store_id(&self) -> &StoreId {
        match self {
            TransportEvent::OwnerRegistered { store_id }
            | TransportEvent::OwnerUnregistered { store_id }
            | TransportEvent::StreamInterrupted { store_id }
            | TransportEvent::StreamRestored { store_id }
            | TransportEvent::ResyncAttempt { store_id, .. }
            | TransportEvent::SnapshotApplied { store_id, .. } => store_id,
        }
    }
}
