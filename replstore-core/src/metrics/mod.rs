/*
    Metrics - query lifecycle and replica resync counters

    Counters:
    - replstore.queries.submitted  (labeled by role)
    - replstore.queries.completed  (labeled by status)
    - replstore.queries.aborted
    - replstore.queries.rejected   (handle saturated)
    - replstore.resync.attempts

    Recorded through the `metrics` facade; install any recorder to export them.
*/

use metrics::{counter, describe_counter};

use crate::core_query::QueryStatus;
use crate::core_store::StoreRole;

/// Register metric descriptions (call once at startup)
pub fn describe_metrics() {
    describe_counter!(
        "replstore.queries.submitted",
        "Queries handed to a store connection, labeled by handle role"
    );
    describe_counter!(
        "replstore.queries.completed",
        "Queries delivered a result by the transport, labeled by status (SUCCESS, FAILURE)"
    );
    describe_counter!(
        "replstore.queries.aborted",
        "Queries terminated without an answer (cancelled, unreachable, dropped)"
    );
    describe_counter!(
        "replstore.queries.rejected",
        "Queries aborted at submission because the handle had too many outstanding"
    );
    describe_counter!(
        "replstore.resync.attempts",
        "Replica resynchronization attempts while the update stream is down"
    );
}

pub fn query_submitted(role: StoreRole) {
    counter!("replstore.queries.submitted", "role" => role.as_str()).increment(1);
}

pub fn query_completed(status: QueryStatus) {
    counter!("replstore.queries.completed", "status" => status.as_str()).increment(1);
}

pub fn query_aborted() {
    counter!("replstore.queries.aborted").increment(1);
}

pub fn query_rejected() {
    counter!("replstore.queries.rejected").increment(1);
}

pub fn resync_attempt() {
    counter!("replstore.resync.attempts").increment(1);
}
