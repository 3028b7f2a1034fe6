//! Query results and the continuation bridge
//!
//! A query issued against a store is answered asynchronously. The pieces here
//! carry the answer back to whoever is waiting for it:
//! - [`QueryStatus`] / [`QueryResult`]: what the answer looks like
//! - [`Continuation`]: the waiting side
//! - [`QueryCallback`]: the link between one in-flight query and its waiter

pub mod call_site;
pub mod callback;
pub mod continuation;
pub mod result;
pub mod status;

pub use call_site::CallSite;
pub use callback::{CallbackState, QueryCallback};
pub use continuation::{Continuation, Suspension};
pub use result::{failure_result, success_result, QueryResult};
pub use status::{status, type_registry, EnumType, EnumValue, QueryStatus, TypeRegistry};
