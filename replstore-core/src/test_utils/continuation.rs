//! A continuation double that records what the query machinery does to it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::core_query::{CallSite, Continuation, QueryResult};

/// Records cache/release calls in order
pub struct RecordingContinuation {
    disabled: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    cached: Mutex<Vec<(CallSite, QueryResult)>>,
    releases: watch::Sender<usize>,
}

impl RecordingContinuation {
    pub fn new() -> Arc<Self> {
        let (releases, _) = watch::channel(0);
        Arc::new(Self {
            disabled: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            cached: Mutex::new(Vec::new()),
            releases,
        })
    }

    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
    }

    pub fn release_count(&self) -> usize {
        *self.releases.borrow()
    }

    /// Every (call site, result) handed to `cache`, in order
    pub fn cached(&self) -> Vec<(CallSite, QueryResult)> {
        self.cached.lock().unwrap().clone()
    }

    pub fn last_result(&self) -> Option<QueryResult> {
        self.cached.lock().unwrap().last().map(|(_, result)| result.clone())
    }

    /// Names of the trait methods invoked, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until `release` has been called at least `count` times
    pub async fn wait_for_release(&self, count: usize) {
        let mut rx = self.releases.subscribe();
        let wait = rx.wait_for(|released| *released >= count);
        if tokio::time::timeout(std::time::Duration::from_secs(5), wait).await.is_err() {
            panic!("continuation released {} times, expected {}", self.release_count(), count);
        }
    }
}

impl Continuation for RecordingContinuation {
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    fn cache(&self, call_site: CallSite, result: QueryResult) {
        self.calls.lock().unwrap().push("cache");
        self.cached.lock().unwrap().push((call_site, result));
    }

    fn release(&self) {
        self.calls.lock().unwrap().push("release");
        self.releases.send_modify(|count| *count += 1);
    }
}
