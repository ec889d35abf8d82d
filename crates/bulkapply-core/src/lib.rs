//! Bulk row-mutation apply engine.
//!
//! Apply a batch of row mutations through a streaming transport, resend rows
//! that failed transiently when it is safe to do so, and report every row
//! that never succeeded.

pub mod config;
pub mod engine;
pub mod failure;
pub mod logging;
pub mod mutation;
pub mod policy;
pub mod status;
pub mod table;
pub mod transport;

pub use engine::{BulkApplyCall, CallContext, CallPhase, CallStats, RowOutcome};
pub use failure::{FailedMutation, FailureReport};
pub use mutation::{BulkBatch, Operation, RowMutation, Timestamp, TimestampRange};
pub use policy::Policies;
pub use status::{Code, Status};
pub use table::Table;
