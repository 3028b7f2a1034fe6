/*
    callback.rs - One in-flight query bound to one waiting continuation

    Responsibilities:
    - hold a strong reference to the caller's continuation while the query is
      outstanding, and drop it exactly once when the query terminates
    - deliver the query's outcome to the continuation: either the result the
      store produced (`deliver_success`) or a failure (`abort`)
    - tell the transport which store and role the query was issued against, so
      the eventual response is routed through the right code path

    Both terminal operations consume the callback, so a second delivery cannot be
    expressed. A callback dropped without being terminated takes the abort path
    so the waiter is never left suspended.

    States:

        Pending ──deliver_success──► Completed
           │
           └────────abort──────────► Aborted
*/

use std::fmt;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

use super::call_site::CallSite;
use super::continuation::Continuation;
use super::result::QueryResult;
use crate::core_store::{StoreId, StoreRole};
use crate::metrics;

/// Lifecycle of a QueryCallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    Pending,
    Completed,
    Aborted,
}

/// Couples a pending store query to the continuation waiting for it
pub struct QueryCallback {
    continuation: Option<Arc<dyn Continuation>>,
    call_site: CallSite,
    store_id: StoreId,
    store_role: StoreRole,
    state: CallbackState,
    /// Slot in the issuing handle's outstanding-query budget
    permit: Option<OwnedSemaphorePermit>,
}

impl QueryCallback {
    /// Bind a query to `continuation`, keeping it alive until the query terminates.
    pub fn new(
        continuation: Arc<dyn Continuation>,
        call_site: CallSite,
        store_id: StoreId,
        store_role: StoreRole,
    ) -> Self {
        QueryCallback {
            continuation: Some(continuation),
            call_site,
            store_id,
            store_role,
            state: CallbackState::Pending,
            permit: None,
        }
    }

    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    /// Hand the store's answer to the continuation and resume it.
    ///
    /// `result` may itself carry a FAILURE status when the backend reports one
    /// (an absent key, for instance); it is delivered unmodified.
    pub fn deliver_success(mut self, result: QueryResult) {
        debug!(
            store = %self.store_id,
            role = %self.store_role,
            call_site = %self.call_site,
            status = %result.status(),
            "Delivering query result"
        );
        metrics::query_completed(result.status());
        self.terminate(result, CallbackState::Completed);
    }

    /// Resume the continuation with a failure result.
    ///
    /// Used when the continuation was disabled or the store became unreachable
    /// before an answer arrived.
    pub fn abort(mut self) {
        debug!(
            store = %self.store_id,
            role = %self.store_role,
            call_site = %self.call_site,
            disabled = self.is_disabled(),
            "Aborting query"
        );
        metrics::query_aborted();
        self.terminate(QueryResult::failure(), CallbackState::Aborted);
    }

    /// Whether the waiting continuation has been cancelled
    pub fn is_disabled(&self) -> bool {
        self.continuation.as_ref().map_or(true, |c| c.is_disabled())
    }

    pub fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    pub fn store_role(&self) -> StoreRole {
        self.store_role
    }

    pub fn call_site(&self) -> CallSite {
        self.call_site
    }

    pub fn state(&self) -> CallbackState {
        self.state
    }

    fn terminate(&mut self, result: QueryResult, outcome: CallbackState) {
        debug_assert_eq!(self.state, CallbackState::Pending);

        if let Some(continuation) = self.continuation.take() {
            continuation.cache(self.call_site, result);
            continuation.release();
        }
        self.permit = None;
        self.state = outcome;
    }
}

impl Drop for QueryCallback {
    fn drop(&mut self) {
        if self.state == CallbackState::Pending {
            warn!(
                store = %self.store_id,
                call_site = %self.call_site,
                "Query callback dropped without an answer, aborting"
            );
            metrics::query_aborted();
            self.terminate(QueryResult::failure(), CallbackState::Aborted);
        }
    }
}

impl fmt::Debug for QueryCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCallback")
            .field("call_site", &self.call_site)
            .field("store_id", &self.store_id)
            .field("store_role", &self.store_role)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_query::continuation::Suspension;
    use crate::test_utils::RecordingContinuation;
    use serde_json::json;
    use tokio::sync::Semaphore;

    fn callback_for(continuation: &Arc<RecordingContinuation>) -> QueryCallback {
        QueryCallback::new(
            continuation.clone(),
            CallSite::next(),
            StoreId::new("cache1"),
            StoreRole::Owner,
        )
    }

    #[test]
    fn test_callback_holds_reference_until_success() {
        let continuation = RecordingContinuation::new();
        let before = Arc::strong_count(&continuation);

        let callback = callback_for(&continuation);
        assert_eq!(Arc::strong_count(&continuation), before + 1);
        assert_eq!(callback.state(), CallbackState::Pending);

        callback.deliver_success(QueryResult::success(json!(42)));
        assert_eq!(Arc::strong_count(&continuation), before);
    }

    #[test]
    fn test_callback_releases_reference_on_abort() {
        let continuation = RecordingContinuation::new();
        let before = Arc::strong_count(&continuation);

        callback_for(&continuation).abort();
        assert_eq!(Arc::strong_count(&continuation), before);
    }

    #[test]
    fn test_deliver_success_passes_result_unmodified() {
        let continuation = RecordingContinuation::new();
        let callback = callback_for(&continuation);
        let site = callback.call_site();
        let result = QueryResult::success(json!({"name": "alice", "visits": [1, 2]}));

        callback.deliver_success(result.clone());

        assert_eq!(continuation.release_count(), 1);
        assert_eq!(continuation.cached(), vec![(site, result)]);
    }

    #[test]
    fn test_deliver_success_accepts_backend_failure() {
        let continuation = RecordingContinuation::new();
        callback_for(&continuation).deliver_success(QueryResult::failure());

        assert_eq!(continuation.release_count(), 1);
        assert!(!continuation.last_result().unwrap().is_success());
    }

    #[test]
    fn test_abort_yields_failure_with_empty_data() {
        let continuation = RecordingContinuation::new();
        let callback = callback_for(&continuation);
        let site = callback.call_site();

        callback.abort();

        let cached = continuation.cached();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].0, site);
        assert_eq!(cached[0].1, QueryResult::failure());
        assert_eq!(cached[0].1.data(), &serde_json::Value::Null);
        assert_eq!(continuation.release_count(), 1);
    }

    #[test]
    fn test_cache_happens_before_release() {
        let continuation = RecordingContinuation::new();
        callback_for(&continuation).deliver_success(QueryResult::success(json!(1)));
        assert_eq!(continuation.calls(), vec!["cache", "release"]);
    }

    #[test]
    fn test_dropped_callback_aborts() {
        let continuation = RecordingContinuation::new();
        let before = Arc::strong_count(&continuation);

        drop(callback_for(&continuation));

        assert_eq!(continuation.release_count(), 1);
        assert_eq!(continuation.last_result(), Some(QueryResult::failure()));
        assert_eq!(Arc::strong_count(&continuation), before);
    }

    #[test]
    fn test_disabled_passes_through() {
        let continuation = RecordingContinuation::new();
        let callback = callback_for(&continuation);
        assert!(!callback.is_disabled());

        continuation.disable();
        assert!(callback.is_disabled());
        callback.abort();
    }

    #[test]
    fn test_accessors() {
        let suspension = Suspension::new();
        let site = CallSite::next();
        let callback =
            QueryCallback::new(suspension.clone(), site, StoreId::new("users"), StoreRole::Replica);

        assert_eq!(callback.store_id().as_str(), "users");
        assert_eq!(callback.store_role(), StoreRole::Replica);
        assert_eq!(callback.call_site(), site);
        callback.abort();
        assert_eq!(suspension.take(site), Some(QueryResult::failure()));
    }

    #[test]
    fn test_permit_released_on_termination() {
        let budget = Arc::new(Semaphore::new(1));
        let continuation = RecordingContinuation::new();

        let permit = budget.clone().try_acquire_owned().unwrap();
        let callback = callback_for(&continuation).with_permit(permit);
        assert_eq!(budget.available_permits(), 0);

        callback.deliver_success(QueryResult::success(json!(null)));
        assert_eq!(budget.available_permits(), 1);
    }
}
