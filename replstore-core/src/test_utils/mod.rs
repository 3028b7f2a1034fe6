//! Test utilities shared by the unit tests
//!
//! - [`RecordingContinuation`]: a continuation that records every call made on it
//! - async helpers for waiting on events with a deadline

pub mod async_helpers;
pub mod continuation;

pub use async_helpers::*;
pub use continuation::*;
