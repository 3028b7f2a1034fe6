//! Async test helpers
//!
//! Deadline-bounded waits for channels and futures.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration};

use crate::core_transport::TransportEvent;

/// Receive the next transport event or panic after `duration`
pub async fn recv_event(
    rx: &mut broadcast::Receiver<TransportEvent>,
    duration: Duration,
) -> TransportEvent {
    match timeout(duration, rx.recv()).await {
        Ok(Ok(event)) => event,
        Ok(Err(e)) => panic!("event stream failed: {}", e),
        Err(_) => panic!("no transport event within {:?}", duration),
    }
}

/// Skip events until one matches `predicate`
pub async fn recv_event_matching<F>(
    rx: &mut broadcast::Receiver<TransportEvent>,
    duration: Duration,
    mut predicate: F,
) -> TransportEvent
where
    F: FnMut(&TransportEvent) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    };
    match timeout(duration, wait).await {
        Ok(event) => event,
        Err(_) => panic!("no matching transport event within {:?}", duration),
    }
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Helper to assert a future does NOT complete within duration
pub async fn assert_times_out<F, T>(duration: Duration, future: F)
where
    F: Future<Output = T>,
{
    if timeout(duration, future).await.is_ok() {
        panic!("Expected future to timeout, but it completed within {:?}", duration);
    }
}
