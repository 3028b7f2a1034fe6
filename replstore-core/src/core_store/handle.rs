/*
    handle.rs - StoreHandle, a participant's view of one named store

    Responsibilities:
    - validate open-time configuration against the requested role
    - obtain a role-appropriate connection from the transport
    - issue read queries, binding each to a continuation through a QueryCallback
    - bound the number of queries outstanding at once

    The handle is read-only after open. Mutations go through the transport.

    Workflow:

        caller ──query(key)──► StoreHandle ──QueryCallback──► StoreConnection
           ▲                                                        │
           └────────── Suspension::resumed ◄── cache + release ◄────┘
*/

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::errors::StoreResult;
use super::options::{BackendKind, BackendOptions, StoreOptions};
use super::role::{StoreId, StoreRole};
use crate::core_query::{CallSite, Continuation, QueryCallback, QueryResult, Suspension};
use crate::core_transport::{ConnectionRequest, Query, StoreConnection, StoreTransport};
use crate::metrics;

/// Handle to a named distributed store
pub struct StoreHandle {
    id: StoreId,
    role: StoreRole,
    backend_kind: Option<BackendKind>,
    backend_options: Option<BackendOptions>,
    resync_interval: Duration,
    max_pending_queries: usize,
    connection: Box<dyn StoreConnection>,
    query_budget: Arc<Semaphore>,
}

impl StoreHandle {
    /// Open a store in the given role.
    ///
    /// Fails without retrying on configuration errors: backend settings on a
    /// remote view, out-of-range options, or a second owner for `id`.
    pub async fn open(
        transport: &dyn StoreTransport,
        id: impl Into<StoreId>,
        role: StoreRole,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let id = id.into();
        options.validate(&id, role)?;

        let StoreOptions { backend_kind, backend_options, resync_interval, max_pending_queries } =
            options;

        let connection = transport
            .open_connection(ConnectionRequest {
                store_id: id.clone(),
                role,
                backend_kind,
                backend_options: backend_options.clone(),
                resync_interval,
            })
            .await?;

        info!(store = %id, role = %role, "Opened store");

        Ok(StoreHandle {
            id,
            role,
            backend_kind,
            backend_options,
            resync_interval,
            max_pending_queries,
            connection,
            query_budget: Arc::new(Semaphore::new(max_pending_queries)),
        })
    }

    pub fn id(&self) -> &StoreId {
        &self.id
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    /// Backend kind, for roles that keep local data
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.role.has_local_data().then(|| self.backend_kind.unwrap_or_default())
    }

    pub fn backend_options(&self) -> Option<&BackendOptions> {
        self.backend_options.as_ref()
    }

    pub fn resync_interval(&self) -> Duration {
        self.resync_interval
    }

    /// Queries issued through this handle that have not terminated yet
    pub fn outstanding_queries(&self) -> usize {
        self.max_pending_queries - self.query_budget.available_permits()
    }

    /// Diagnostic rendering of the handle's identity
    pub fn describe(&self) -> String {
        format!("StoreHandle{{id={}, role={}}}", self.id, self.role)
    }

    /// Issue `query`, resuming `continuation` under `call_site` when it terminates.
    ///
    /// When the handle already has `max_pending_queries` outstanding, the query
    /// is aborted on the spot: the continuation still gets its FAILURE result.
    pub fn submit(&self, query: Query, continuation: Arc<dyn Continuation>, call_site: CallSite) {
        let callback = QueryCallback::new(continuation, call_site, self.id.clone(), self.role);

        match self.query_budget.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!(
                    store = %self.id,
                    call_site = %call_site,
                    kind = query.kind(),
                    "Submitting query"
                );
                metrics::query_submitted(self.role);
                self.connection.submit_query(query, callback.with_permit(permit));
            }
            Err(_) => {
                warn!(
                    store = %self.id,
                    limit = self.max_pending_queries,
                    "Too many outstanding queries, aborting"
                );
                metrics::query_rejected();
                callback.abort();
            }
        }
    }

    /// Issue `query` and wait for its result
    pub async fn query(&self, query: Query) -> QueryResult {
        let suspension = Suspension::new();
        let call_site = CallSite::next();
        self.submit(query, suspension.clone(), call_site);
        suspension.resumed(call_site).await
    }

    /// Issue `query` and wait at most `timeout` for its result.
    ///
    /// On timeout the wait is cancelled and a FAILURE result is returned; the
    /// transport aborts the in-flight query when it gets to it.
    pub async fn query_with_timeout(&self, query: Query, timeout: Duration) -> QueryResult {
        let suspension = Suspension::new();
        let call_site = CallSite::next();
        self.submit(query, suspension.clone(), call_site);

        match tokio::time::timeout(timeout, suspension.resumed(call_site)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(store = %self.id, call_site = %call_site, "Query timed out");
                suspension.disable();
                QueryResult::failure()
            }
        }
    }

    /// Value stored under `key`. FAILURE when the key is absent.
    pub async fn lookup(&self, key: Value) -> QueryResult {
        self.query(Query::Lookup(key)).await
    }

    /// Whether `key` is present, as a boolean payload
    pub async fn exists(&self, key: Value) -> QueryResult {
        self.query(Query::Exists(key)).await
    }

    /// Number of entries in the store
    pub async fn size(&self) -> QueryResult {
        self.query(Query::Size).await
    }
}

impl fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("backend_kind", &self.backend_kind)
            .field("resync_interval", &self.resync_interval)
            .finish()
    }
}
