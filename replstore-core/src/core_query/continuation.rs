/*
    continuation.rs - The caller-side suspend/resume point

    A continuation represents "someone is waiting for this answer". The query
    machinery only needs four things from it:
    - a strong reference, held while a query is outstanding (Arc)
    - whether the wait has been cancelled (`is_disabled`)
    - somewhere to put the answer for a given call site (`cache`)
    - a way to resume the waiter (`release`)

    `Suspension` is the continuation used by StoreHandle::query. Hosts with
    their own scheduler implement the trait directly.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::trace;

use super::call_site::CallSite;
use super::result::QueryResult;

/// Caller-side suspend point a query resumes when it terminates
pub trait Continuation: Send + Sync {
    /// True once the waiting computation no longer wants an answer
    fn is_disabled(&self) -> bool;

    /// Store the result for `call_site` so the resumed computation can read it
    fn cache(&self, call_site: CallSite, result: QueryResult);

    /// Resume the waiting computation
    fn release(&self);
}

/// Continuation backed by a result cache and a release counter.
///
/// Waiters block on [`Suspension::resumed`] until the query for their call
/// site has been cached and released.
pub struct Suspension {
    results: Mutex<HashMap<CallSite, QueryResult>>,
    disabled: AtomicBool,
    releases: watch::Sender<usize>,
}

impl Suspension {
    pub fn new() -> Arc<Self> {
        let (releases, _) = watch::channel(0);
        Arc::new(Suspension {
            results: Mutex::new(HashMap::new()),
            disabled: AtomicBool::new(false),
            releases,
        })
    }

    /// Cancel the wait. In-flight queries will be aborted rather than answered.
    pub fn disable(&self) {
        if !self.disabled.swap(true, Ordering::AcqRel) {
            trace!("suspension disabled");
        }
    }

    /// Number of times this suspension has been released
    pub fn release_count(&self) -> usize {
        *self.releases.borrow()
    }

    /// Remove and return the cached result for `call_site`
    pub fn take(&self, call_site: CallSite) -> Option<QueryResult> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).remove(&call_site)
    }

    pub fn has_result(&self, call_site: CallSite) -> bool {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&call_site)
    }

    /// Wait until the result for `call_site` has been delivered, then take it.
    pub async fn resumed(&self, call_site: CallSite) -> QueryResult {
        let mut rx = self.releases.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|_| self.has_result(call_site)).await;
        self.take(call_site).unwrap_or_default()
    }
}

impl Continuation for Suspension {
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    fn cache(&self, call_site: CallSite, result: QueryResult) {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).insert(call_site, result);
    }

    fn release(&self) {
        self.releases.send_modify(|count| *count += 1);
    }
}

impl std::fmt::Debug for Suspension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suspension")
            .field("disabled", &self.is_disabled())
            .field("releases", &self.release_count())
            .finish()
    }
}
