//! Aggregated report for rows that never succeeded.

use thiserror::Error;

use crate::mutation::{BulkBatch, RowMutation};
use crate::status::Status;

/// One row that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedMutation {
    original_index: usize,
    mutation: RowMutation,
    status: Status,
}

impl FailedMutation {
    pub fn new(original_index: usize, mutation: RowMutation, status: Status) -> Self {
        Self {
            original_index,
            mutation,
            status,
        }
    }

    /// Position of the row in the caller's batch.
    pub fn original_index(&self) -> usize {
        self.original_index
    }

    pub fn mutation(&self) -> &RowMutation {
        &self.mutation
    }

    /// Last status known for this row.
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn into_mutation(self) -> RowMutation {
        self.mutation
    }
}

/// Returned by a bulk apply when at least one row did not succeed.
///
/// Lists every failed row, not only the first, ordered by original index,
/// along with the stream status of the last attempt.
#[derive(Debug, Clone, Error)]
#[error(
    "permanent errors in bulk apply: {} of {total_rows} rows failed after {attempts} attempts (last stream status: {stream_status})",
    .failures.len()
)]
pub struct FailureReport {
    stream_status: Status,
    failures: Vec<FailedMutation>,
    attempts: u32,
    total_rows: usize,
}

impl FailureReport {
    pub fn new(
        stream_status: Status,
        failures: Vec<FailedMutation>,
        attempts: u32,
        total_rows: usize,
    ) -> Self {
        Self {
            stream_status,
            failures,
            attempts,
            total_rows,
        }
    }

    /// Final status of the last attempt's stream.
    pub fn stream_status(&self) -> &Status {
        &self.stream_status
    }

    pub fn failures(&self) -> &[FailedMutation] {
        &self.failures
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Size of the batch the report is about.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn into_failures(self) -> Vec<FailedMutation> {
        self.failures
    }

    /// A new batch holding the failed mutations, in their original order.
    /// Original indices of the new batch restart at zero.
    pub fn retry_batch(&self) -> BulkBatch {
        self.failures.iter().map(|f| f.mutation.clone()).collect()
    }
}
