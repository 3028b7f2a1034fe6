//! replstore-core: handles onto named distributed key-value stores
//!
//! A participant opens a store as an owner (holds the authoritative copy),
//! a replica (keeps a synchronized local copy) or a remote view (keeps
//! nothing and asks the owner). Reads are asynchronous queries whose results
//! are delivered exactly once to a waiting continuation.

pub mod config;
pub mod core_query;
pub mod core_store;
pub mod core_transport;
pub mod logging;
pub mod metrics;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use core_query::{
    failure_result, status, success_result, CallSite, Continuation, QueryCallback, QueryResult,
    QueryStatus, Suspension,
};
pub use core_store::{
    BackendKind, BackendOptions, StoreError, StoreHandle, StoreId, StoreOptions, StoreResult,
    StoreRole,
};
pub use core_transport::{
    MemoryTransport, Query, QueryTicket, StoreTransport, TransportConfig, TransportEvent,
};
pub use logging::{init_logging, LogLevel};
