//! Per-row outcome table for one bulk-apply call.

use crate::failure::FailedMutation;
use crate::mutation::{BulkBatch, RowMutation};
use crate::policy::{is_transient, IdempotencyPolicy};
use crate::status::Status;

/// Where a row stands within a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Not yet sent.
    Pending,
    Succeeded,
    /// Failed or undetermined, and safe to resend.
    Retryable(Status),
    /// Will not be resent; ends up in the failure report.
    PermanentlyFailed(Status),
}

impl RowOutcome {
    /// Pending and retryable rows are sent in the next attempt.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, RowOutcome::Pending | RowOutcome::Retryable(_))
    }

    pub fn last_status(&self) -> Option<&Status> {
        match self {
            RowOutcome::Retryable(s) | RowOutcome::PermanentlyFailed(s) => Some(s),
            RowOutcome::Pending | RowOutcome::Succeeded => None,
        }
    }
}

#[derive(Debug)]
struct TrackedRow {
    mutation: RowMutation,
    idempotent: bool,
    outcome: RowOutcome,
}

/// Row states indexed by original index.
#[derive(Debug)]
pub(crate) struct RowTable {
    rows: Vec<TrackedRow>,
}

impl RowTable {
    pub(crate) fn new(batch: BulkBatch, idempotency: &dyn IdempotencyPolicy) -> Self {
        let rows = batch
            .into_rows()
            .into_iter()
            .map(|mutation| TrackedRow {
                idempotent: idempotency.is_idempotent(&mutation),
                mutation,
                outcome: RowOutcome::Pending,
            })
            .collect();
        Self { rows }
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Original indices of every pending or retryable row, in order.
    pub(crate) fn outstanding(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.outcome.is_outstanding())
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn has_outstanding(&self) -> bool {
        self.rows.iter().any(|r| r.outcome.is_outstanding())
    }

    pub(crate) fn all_succeeded(&self) -> bool {
        self.rows
            .iter()
            .all(|r| r.outcome == RowOutcome::Succeeded)
    }

    pub(crate) fn mutation(&self, original_index: usize) -> &RowMutation {
        &self.rows[original_index].mutation
    }

    pub(crate) fn outcome(&self, original_index: usize) -> Option<&RowOutcome> {
        self.rows.get(original_index).map(|r| &r.outcome)
    }

    /// Apply an explicit per-row status from the stream.
    pub(crate) fn record_reported(&mut self, original_index: usize, status: Status) -> &RowOutcome {
        let row = &mut self.rows[original_index];
        debug_assert!(row.outcome.is_outstanding());
        row.outcome = if status.is_ok() {
            RowOutcome::Succeeded
        } else if is_transient(&status) && row.idempotent {
            RowOutcome::Retryable(status)
        } else {
            RowOutcome::PermanentlyFailed(status)
        };
        &row.outcome
    }

    /// A row was sent but the stream ended without reporting it.
    pub(crate) fn record_undetermined(
        &mut self,
        original_index: usize,
        status: Status,
    ) -> &RowOutcome {
        let row = &mut self.rows[original_index];
        debug_assert!(row.outcome.is_outstanding());
        row.outcome = if row.idempotent {
            RowOutcome::Retryable(status)
        } else {
            RowOutcome::PermanentlyFailed(status)
        };
        &row.outcome
    }

    /// Retry budget is gone: every outstanding row fails with its own last
    /// status, or `stream_status` if it never had one.
    pub(crate) fn exhaust(&mut self, stream_status: &Status) {
        for row in self.rows.iter_mut() {
            row.outcome = match std::mem::replace(&mut row.outcome, RowOutcome::Pending) {
                RowOutcome::Pending => RowOutcome::PermanentlyFailed(stream_status.clone()),
                RowOutcome::Retryable(s) => RowOutcome::PermanentlyFailed(s),
                done => done,
            };
        }
    }

    /// Every row that did not succeed, ordered by original index.
    pub(crate) fn failures(&self) -> Vec<FailedMutation> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.outcome != RowOutcome::Succeeded)
            .map(|(i, r)| {
                let status = r
                    .outcome
                    .last_status()
                    .cloned()
                    .unwrap_or_else(Status::undetermined);
                FailedMutation::new(i, r.mutation.clone(), status)
            })
            .collect()
    }
}
