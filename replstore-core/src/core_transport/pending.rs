/*
    pending.rs - Registry of queries waiting for an answer

    The transport parks every submitted query here under a ticket it
    allocates itself. Call sites belong to the caller and may repeat across
    concurrent queries, so they never key the registry; they only travel
    with the callback to the continuation's cache. An answer is delivered
    only if the ticket's entry can still be taken out, so each query is
    terminated at most once no matter how many responses or sweeps race for
    it. Callbacks always run after the registry lock is released.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::Query;
use crate::core_query::{CallSite, QueryCallback, QueryResult};
use crate::core_store::{StoreError, StoreResult};

/// Transport-internal identity of one parked query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryTicket(u64);

impl QueryTicket {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        QueryTicket(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueryTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

/// A parked query and the callback that answers it
#[derive(Debug)]
pub struct PendingQuery {
    pub query: Query,
    pub callback: QueryCallback,
}

#[derive(Debug, Default)]
struct Registry {
    next_ticket: AtomicU64,
    entries: Mutex<HashMap<QueryTicket, PendingQuery>>,
}

/// Outstanding queries, shared between the submitting side and responders
#[derive(Debug, Clone, Default)]
pub struct PendingQueries {
    inner: Arc<Registry>,
}

impl PendingQueries {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryTicket, PendingQuery>> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park a query under a fresh ticket
    pub fn insert(&self, query: Query, callback: QueryCallback) -> QueryTicket {
        let ticket = QueryTicket(self.inner.next_ticket.fetch_add(1, Ordering::Relaxed));
        trace!(ticket = %ticket, call_site = %callback.call_site(), "Parking query");
        self.lock().insert(ticket, PendingQuery { query, callback });
        ticket
    }

    /// Remove a parked query so the caller can answer it
    pub fn take(&self, ticket: QueryTicket) -> Option<PendingQuery> {
        self.lock().remove(&ticket)
    }

    /// Deliver `result` to the query parked under `ticket`
    pub fn complete(&self, ticket: QueryTicket, result: QueryResult) -> StoreResult<()> {
        let pending = self.take(ticket).ok_or(StoreError::UnknownQuery(ticket))?;
        pending.callback.deliver_success(result);
        Ok(())
    }

    /// Abort the query parked under `ticket`
    pub fn abort(&self, ticket: QueryTicket) -> StoreResult<()> {
        let pending = self.take(ticket).ok_or(StoreError::UnknownQuery(ticket))?;
        pending.callback.abort();
        Ok(())
    }

    /// Tickets of the parked queries issued under `call_site`, oldest first
    pub fn tickets_for(&self, call_site: CallSite) -> Vec<QueryTicket> {
        let mut tickets: Vec<QueryTicket> = self
            .lock()
            .iter()
            .filter(|(_, pending)| pending.callback.call_site() == call_site)
            .map(|(ticket, _)| *ticket)
            .collect();
        tickets.sort();
        tickets
    }

    /// Abort every query whose continuation has been disabled.
    /// Returns how many were aborted.
    pub fn abort_disabled(&self) -> usize {
        let disabled: Vec<PendingQuery> = {
            let mut map = self.lock();
            let tickets: Vec<QueryTicket> = map
                .iter()
                .filter(|(_, pending)| pending.callback.is_disabled())
                .map(|(ticket, _)| *ticket)
                .collect();
            tickets.into_iter().filter_map(|ticket| map.remove(&ticket)).collect()
        };

        let count = disabled.len();
        for pending in disabled {
            pending.callback.abort();
        }
        count
    }

    /// Abort everything still parked
    pub fn abort_all(&self) -> usize {
        let drained: Vec<PendingQuery> = self.lock().drain().map(|(_, pending)| pending).collect();
        let count = drained.len();
        for pending in drained {
            pending.callback.abort();
        }
        count
    }

    pub fn contains(&self, ticket: QueryTicket) -> bool {
        self.lock().contains_key(&ticket)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
