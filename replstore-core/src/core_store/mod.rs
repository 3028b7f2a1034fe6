//! Store handles, roles and backends
//!
//! A [`StoreHandle`] names a distributed store and records how this participant
//! relates to it ([`StoreRole`]). Owners and replicas keep their entries in a
//! [`backend::Backend`]; remote views keep nothing locally.

pub mod backend;
pub mod errors;
pub mod handle;
pub mod options;
pub mod role;

pub use backend::{Backend, MemoryBackend, SqliteBackend};
pub use errors::{StoreError, StoreResult};
pub use handle::StoreHandle;
pub use options::{
    BackendKind, BackendOptions, SqliteOptions, StoreOptions, DEFAULT_MAX_PENDING_QUERIES,
    DEFAULT_RESYNC_INTERVAL,
};
pub use role::{StoreId, StoreRole};
