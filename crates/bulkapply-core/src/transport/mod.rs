//! The streaming RPC seam the engine sends attempts through.
//!
//! A transport takes the rows of one attempt and returns a stream of
//! per-entry results keyed by attempt-local index, followed by a final
//! stream status. Entries may arrive in any order and some may never arrive.

pub mod memory;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::mutation::RowMutation;
use crate::status::Status;

pub use memory::{FaultPlan, InMemoryTransport};

/// One per-row result reported by a mutate-rows stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    /// Position of the row within the rows sent in this attempt.
    pub index: usize,
    pub status: Status,
}

impl EntryStatus {
    pub fn new(index: usize, status: Status) -> Self {
        Self { index, status }
    }
}

/// Per-attempt cancellation and deadline handed to the transport.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    /// Cancelled when the engine abandons the attempt.
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
    /// 1-based attempt number within the call.
    pub attempt: u32,
}

/// Sends one attempt's rows to the store.
#[async_trait]
pub trait MutateRowsTransport: Send + Sync {
    type Stream: MutationStream;

    async fn mutate_rows(
        &self,
        table_name: &str,
        rows: Vec<RowMutation>,
        ctx: AttemptContext,
    ) -> Self::Stream;
}

/// The response side of one attempt.
#[async_trait]
pub trait MutationStream: Send {
    /// Next per-entry result, or `None` at end of stream.
    async fn next_entry(&mut self) -> Option<EntryStatus>;

    /// Overall outcome of the attempt. Only meaningful after `next_entry`
    /// returned `None`.
    async fn finish(&mut self) -> Status;
}
