/*
    memory.rs - In-process transport

    Simulates the replication network inside one process:
    - one owner per store id, registered when an owner handle opens and
      removed when it closes
    - mutations are applied to the owner's backend and published on the
      store's update stream while the stream is connected
    - replicas materialize a snapshot on open, follow the update stream, and
      while the stream is interrupted pull a full snapshot every resync
      interval until it comes back
    - queries are parked in a PendingQueries registry and answered from a
      spawned task after the configured latency; a query whose continuation
      was disabled in the meantime is aborted instead

    ┌────────────┐  put/erase   ┌─────────────┐  Update   ┌──────────────┐
    │   caller   │─────────────►│ owner store │──────────►│ replica task │
    └────────────┘              └─────────────┘ broadcast └──────┬───────┘
                                       ▲                         │ link down
                                       └──── snapshot every ─────┘
                                             resync_interval
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::events::TransportEvent;
use super::pending::{PendingQueries, PendingQuery, QueryTicket};
use super::{ConnectionRequest, Query, StoreConnection, StoreTransport};
use crate::core_query::{QueryCallback, QueryResult};
use crate::core_store::backend::{open_backend, Backend};
use crate::core_store::{StoreError, StoreId, StoreResult, StoreRole};
use crate::metrics;

/// Tuning for the in-process transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Simulated delay before a query is answered
    #[serde(with = "humantime_serde")]
    pub latency: Duration,

    /// Capacity of each store's update stream
    pub update_buffer: usize,

    /// Capacity of the transport event stream
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            latency: Duration::ZERO,
            update_buffer: 256,
            event_buffer: 256,
        }
    }
}

impl TransportConfig {
    /// Builder: set query latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// A mutation published on a store's update stream
#[derive(Debug, Clone, PartialEq)]
enum Update {
    Put { key: Value, value: Value },
    Erase { key: Value },
}

/// State of a store's update stream as replicas see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamState {
    connected: bool,
    /// Bumped whenever the owner changes
    owner_epoch: u64,
}

struct StoreChannel {
    owner: Option<Arc<dyn Backend>>,
    updates: broadcast::Sender<Update>,
    stream: watch::Sender<StreamState>,
}

impl StoreChannel {
    fn new(update_buffer: usize) -> Self {
        let (updates, _) = broadcast::channel(update_buffer.max(1));
        let (stream, _) = watch::channel(StreamState { connected: true, owner_epoch: 0 });
        StoreChannel { owner: None, updates, stream }
    }
}

struct Shared {
    config: TransportConfig,
    stores: Mutex<HashMap<StoreId, StoreChannel>>,
    pending: PendingQueries,
    events: broadcast::Sender<TransportEvent>,
}

/// Where a query is answered from
enum Source {
    Local(Arc<dyn Backend>),
    Owner(StoreId),
}

impl Shared {
    fn stores(&self) -> MutexGuard<'_, HashMap<StoreId, StoreChannel>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn owner_backend(&self, id: &StoreId) -> Option<Arc<dyn Backend>> {
        self.stores().get(id).and_then(|channel| channel.owner.clone())
    }

    fn register_owner(&self, id: &StoreId, backend: Arc<dyn Backend>) -> StoreResult<()> {
        {
            let mut stores = self.stores();
            let channel = stores
                .entry(id.clone())
                .or_insert_with(|| StoreChannel::new(self.config.update_buffer));
            if channel.owner.is_some() {
                return Err(StoreError::DuplicateOwner(id.to_string()));
            }
            channel.owner = Some(backend);
            channel.stream.send_modify(|state| state.owner_epoch += 1);
        }

        info!(store = %id, "Registered store owner");
        self.emit(TransportEvent::OwnerRegistered { store_id: id.clone() });
        Ok(())
    }

    fn unregister_owner(&self, id: &StoreId, backend: &Arc<dyn Backend>) {
        let removed = {
            let mut stores = self.stores();
            match stores.get_mut(id) {
                Some(channel)
                    if channel.owner.as_ref().is_some_and(|b| Arc::ptr_eq(b, backend)) =>
                {
                    channel.owner = None;
                    channel.stream.send_modify(|state| state.owner_epoch += 1);
                    true
                }
                _ => false,
            }
        };

        if removed {
            info!(store = %id, "Unregistered store owner");
            self.emit(TransportEvent::OwnerUnregistered { store_id: id.clone() });
        }
    }

    /// Subscribe to a store's stream and take the owner's current contents,
    /// under one lock so no update falls between the two.
    fn attach_replica(
        &self,
        id: &StoreId,
    ) -> (
        broadcast::Receiver<Update>,
        watch::Receiver<StreamState>,
        Option<StoreResult<Vec<(Value, Value)>>>,
    ) {
        let mut stores = self.stores();
        let channel = stores
            .entry(id.clone())
            .or_insert_with(|| StoreChannel::new(self.config.update_buffer));
        let snapshot = channel.owner.as_ref().map(|owner| owner.snapshot());
        (channel.updates.subscribe(), channel.stream.subscribe(), snapshot)
    }

    fn publish(&self, id: &StoreId, update: Update) -> StoreResult<()> {
        let stores = self.stores();
        let channel = stores
            .get(id)
            .ok_or_else(|| StoreError::Transport(format!("Store '{}' has no owner", id)))?;
        let owner = channel
            .owner
            .as_ref()
            .ok_or_else(|| StoreError::Transport(format!("Store '{}' has no owner", id)))?;

        match &update {
            Update::Put { key, value } => owner.insert(key.clone(), value.clone())?,
            Update::Erase { key } => owner.erase(key)?,
        }

        if channel.stream.borrow().connected {
            // Replicas may not exist yet.
            let _ = channel.updates.send(update);
        }
        Ok(())
    }

    fn set_connected(&self, id: &StoreId, connected: bool) {
        let changed = {
            let mut stores = self.stores();
            let channel = stores
                .entry(id.clone())
                .or_insert_with(|| StoreChannel::new(self.config.update_buffer));
            channel.stream.send_if_modified(|state| {
                let changed = state.connected != connected;
                state.connected = connected;
                changed
            })
        };

        if !changed {
            return;
        }
        if connected {
            info!(store = %id, "Update stream restored");
            self.emit(TransportEvent::StreamRestored { store_id: id.clone() });
        } else {
            warn!(store = %id, "Update stream interrupted");
            self.emit(TransportEvent::StreamInterrupted { store_id: id.clone() });
        }
    }

    /// Replace a replica's contents with the owner's, if there is an owner
    fn resync(&self, id: &StoreId, replica: &dyn Backend) -> StoreResult<bool> {
        let Some(owner) = self.owner_backend(id) else {
            debug!(store = %id, "No owner to resync from");
            return Ok(false);
        };

        let snapshot = owner.snapshot()?;
        let entries = snapshot.len();
        replica.restore(snapshot)?;
        debug!(store = %id, entries, "Applied owner snapshot");
        self.emit(TransportEvent::SnapshotApplied { store_id: id.clone(), entries });
        Ok(true)
    }

    fn dispatch(self: &Arc<Self>, ticket: QueryTicket, source: Source) {
        let latency = self.config.latency;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(self);
                runtime.spawn(async move {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    shared.answer(ticket, source);
                });
            }
            Err(_) => {
                debug!(ticket = %ticket, "No runtime, answering inline");
                self.answer(ticket, source);
            }
        }
    }

    fn answer(&self, ticket: QueryTicket, source: Source) {
        let Some(PendingQuery { query, callback }) = self.pending.take(ticket) else {
            // Already aborted by a sweep.
            return;
        };

        if callback.is_disabled() {
            callback.abort();
            return;
        }

        let backend = match source {
            Source::Local(backend) => Some(backend),
            Source::Owner(id) => self.owner_backend(&id),
        };
        let Some(backend) = backend else {
            debug!(store = %callback.store_id(), "Store unreachable, aborting query");
            callback.abort();
            return;
        };

        match execute(backend.as_ref(), &query) {
            Ok(result) => callback.deliver_success(result),
            Err(e) => {
                warn!(store = %callback.store_id(), error = %e, "Backend failed to answer query");
                callback.abort();
            }
        }
    }
}

fn execute(backend: &dyn Backend, query: &Query) -> StoreResult<QueryResult> {
    match query {
        Query::Lookup(key) => Ok(match backend.lookup(key)? {
            Some(value) => QueryResult::success(value),
            None => QueryResult::failure(),
        }),
        Query::Exists(key) => Ok(QueryResult::success(Value::Bool(backend.exists(key)?))),
        Query::Size => Ok(QueryResult::success(Value::from(backend.size()?))),
    }
}

fn apply(backend: &dyn Backend, update: Update) -> StoreResult<()> {
    match update {
        Update::Put { key, value } => backend.insert(key, value),
        Update::Erase { key } => backend.erase(&key),
    }
}

/// In-process store network
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn new(config: TransportConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        MemoryTransport {
            shared: Arc::new(Shared {
                config,
                stores: Mutex::new(HashMap::new()),
                pending: PendingQueries::new(),
                events,
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Subscribe to transport events
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }

    /// Queries not yet answered
    pub fn pending(&self) -> &PendingQueries {
        &self.shared.pending
    }

    /// Abort queries whose waiters have gone away
    pub fn abort_disabled(&self) -> usize {
        self.shared.pending.abort_disabled()
    }

    pub fn has_owner(&self, id: &StoreId) -> bool {
        self.shared.owner_backend(id).is_some()
    }

    /// Write `key` at the owner and publish it to replicas
    pub fn put(&self, id: &StoreId, key: Value, value: Value) -> StoreResult<()> {
        self.shared.publish(id, Update::Put { key, value })
    }

    /// Remove `key` at the owner and publish it to replicas
    pub fn erase(&self, id: &StoreId, key: Value) -> StoreResult<()> {
        self.shared.publish(id, Update::Erase { key })
    }

    /// Take the store's update stream down
    pub fn interrupt_updates(&self, id: &StoreId) {
        self.shared.set_connected(id, false);
    }

    /// Bring the store's update stream back up
    pub fn restore_updates(&self, id: &StoreId) {
        self.shared.set_connected(id, true);
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl StoreTransport for MemoryTransport {
    async fn open_connection(
        &self,
        request: ConnectionRequest,
    ) -> StoreResult<Box<dyn StoreConnection>> {
        let shared = Arc::clone(&self.shared);
        let ConnectionRequest { store_id, role, backend_kind, backend_options, resync_interval } =
            request;

        match role {
            StoreRole::RemoteView => Ok(Box::new(RemoteViewConnection { shared, store_id })),
            StoreRole::Owner => {
                let backend =
                    open_backend(backend_kind.unwrap_or_default(), backend_options.as_ref())?;
                shared.register_owner(&store_id, backend.clone())?;
                Ok(Box::new(OwnerConnection { shared, store_id, backend }))
            }
            StoreRole::Replica => {
                let backend =
                    open_backend(backend_kind.unwrap_or_default(), backend_options.as_ref())?;
                let (updates, stream, snapshot) = shared.attach_replica(&store_id);

                match snapshot {
                    Some(Ok(entries)) => {
                        let count = entries.len();
                        backend.restore(entries)?;
                        shared.emit(TransportEvent::SnapshotApplied {
                            store_id: store_id.clone(),
                            entries: count,
                        });
                    }
                    Some(Err(e)) => {
                        warn!(store = %store_id, error = %e, "Initial snapshot failed");
                    }
                    None => debug!(store = %store_id, "Replica opened with no owner"),
                }

                let sync = ReplicaSync {
                    shared: Arc::clone(&shared),
                    store_id: store_id.clone(),
                    backend: backend.clone(),
                    resync_interval,
                };
                let task = tokio::spawn(sync.run(updates, stream));
                Ok(Box::new(ReplicaConnection { shared, store_id, backend, task }))
            }
        }
    }
}

struct RemoteViewConnection {
    shared: Arc<Shared>,
    store_id: StoreId,
}

impl StoreConnection for RemoteViewConnection {
    fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    fn role(&self) -> StoreRole {
        StoreRole::RemoteView
    }

    fn submit_query(&self, query: Query, callback: QueryCallback) {
        let ticket = self.shared.pending.insert(query, callback);
        self.shared.dispatch(ticket, Source::Owner(self.store_id.clone()));
    }
}

struct OwnerConnection {
    shared: Arc<Shared>,
    store_id: StoreId,
    backend: Arc<dyn Backend>,
}

impl StoreConnection for OwnerConnection {
    fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    fn role(&self) -> StoreRole {
        StoreRole::Owner
    }

    fn submit_query(&self, query: Query, callback: QueryCallback) {
        let ticket = self.shared.pending.insert(query, callback);
        self.shared.dispatch(ticket, Source::Local(self.backend.clone()));
    }
}

impl Drop for OwnerConnection {
    fn drop(&mut self) {
        self.shared.unregister_owner(&self.store_id, &self.backend);
    }
}

struct ReplicaConnection {
    shared: Arc<Shared>,
    store_id: StoreId,
    backend: Arc<dyn Backend>,
    task: JoinHandle<()>,
}

impl StoreConnection for ReplicaConnection {
    fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    fn role(&self) -> StoreRole {
        StoreRole::Replica
    }

    fn submit_query(&self, query: Query, callback: QueryCallback) {
        let ticket = self.shared.pending.insert(query, callback);
        self.shared.dispatch(ticket, Source::Local(self.backend.clone()));
    }
}

impl Drop for ReplicaConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Background task keeping a replica in step with its owner
struct ReplicaSync {
    shared: Arc<Shared>,
    store_id: StoreId,
    backend: Arc<dyn Backend>,
    resync_interval: Duration,
}

impl ReplicaSync {
    async fn run(
        self,
        mut updates: broadcast::Receiver<Update>,
        mut stream: watch::Receiver<StreamState>,
    ) {
        let mut attempts = 0u64;
        let mut owner_epoch = stream.borrow().owner_epoch;

        loop {
            let state = *stream.borrow_and_update();

            if state.connected {
                if state.owner_epoch != owner_epoch {
                    owner_epoch = state.owner_epoch;
                    self.catch_up(&mut updates);
                }

                tokio::select! {
                    update = updates.recv() => match update {
                        Ok(update) => {
                            if let Err(e) = apply(self.backend.as_ref(), update) {
                                warn!(store = %self.store_id, error = %e, "Failed to apply update");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(store = %self.store_id, missed, "Replica fell behind, resynchronizing");
                            self.catch_up(&mut updates);
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                    changed = stream.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }

            // Stream interrupted: pull snapshots until it recovers.
            let start = Instant::now() + self.resync_interval;
            let mut ticker = interval_at(start, self.resync_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        attempts += 1;
                        metrics::resync_attempt();
                        self.shared.emit(TransportEvent::ResyncAttempt {
                            store_id: self.store_id.clone(),
                            attempt: attempts,
                            at: Instant::now(),
                        });
                        if let Err(e) = self.shared.resync(&self.store_id, self.backend.as_ref()) {
                            warn!(store = %self.store_id, attempt = attempts, error = %e, "Resync attempt failed");
                        }
                    }
                    changed = stream.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if stream.borrow().connected {
                            break;
                        }
                    }
                }
            }

            owner_epoch = stream.borrow().owner_epoch;
            self.catch_up(&mut updates);
        }
    }

    /// Discard buffered updates and take a fresh snapshot
    fn catch_up(&self, updates: &mut broadcast::Receiver<Update>) {
        *updates = updates.resubscribe();
        if let Err(e) = self.shared.resync(&self.store_id, self.backend.as_ref()) {
            warn!(store = %self.store_id, error = %e, "Resync failed");
        }
    }
}
