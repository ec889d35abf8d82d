//! Bulk-apply engine.
//!
//! Sends the outstanding rows of a batch in sequential attempts, tracks each
//! row by its original index, and resends only rows that failed transiently
//! and are idempotent. Every attempt with a failure is charged to the retry
//! policy once; when the policy says stop, outstanding rows become permanent
//! failures and the call returns a `FailureReport`.

mod attempt;
mod context;
mod rows;

use std::time::Duration;

use tracing::{debug, warn};

use crate::failure::FailureReport;
use crate::mutation::BulkBatch;
use crate::policy::CallPolicies;
use crate::status::Status;
use crate::transport::MutateRowsTransport;

use attempt::{run_attempt, AttemptResult};
use context::sleep_until_opt;
use rows::RowTable;

pub use context::CallContext;
pub use rows::RowOutcome;

/// Lifecycle of a bulk-apply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    NotStarted,
    Attempting,
    Succeeded,
    Failed,
}

/// Counters collected while a call runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Attempts actually sent to the transport.
    pub attempts: u32,
    /// Times the retry policy was notified of a failed attempt.
    pub retry_notifications: u32,
    /// Explicit OK statuses received, across all attempts.
    pub rows_succeeded: usize,
}

/// One bulk-apply call over one batch.
pub struct BulkApplyCall<'a, T: MutateRowsTransport> {
    transport: &'a T,
    table_name: &'a str,
    rows: RowTable,
    policies: CallPolicies,
    phase: CallPhase,
    stats: CallStats,
    stream_status: Status,
}

impl<'a, T: MutateRowsTransport> BulkApplyCall<'a, T> {
    pub fn new(
        transport: &'a T,
        table_name: &'a str,
        batch: BulkBatch,
        policies: CallPolicies,
    ) -> Self {
        let rows = RowTable::new(batch, policies.idempotency.as_ref());
        Self {
            transport,
            table_name,
            rows,
            policies,
            phase: CallPhase::NotStarted,
            stats: CallStats::default(),
            stream_status: Status::ok(),
        }
    }

    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.len() == 0
    }

    pub fn outcome(&self, original_index: usize) -> Option<&RowOutcome> {
        self.rows.outcome(original_index)
    }

    /// Run attempts until every row succeeded or the retry policy gives up.
    ///
    /// Calling `run` again after the call ended returns the same result
    /// without sending anything.
    pub async fn run(&mut self, ctx: &CallContext) -> Result<(), FailureReport> {
        if self.phase == CallPhase::NotStarted {
            self.phase = CallPhase::Attempting;
            self.attempt_loop(ctx).await;
            self.phase = if self.rows.all_succeeded() {
                CallPhase::Succeeded
            } else {
                CallPhase::Failed
            };
        }
        match self.phase {
            CallPhase::Failed => Err(self.report()),
            _ => Ok(()),
        }
    }

    async fn attempt_loop(&mut self, ctx: &CallContext) {
        while self.rows.has_outstanding() {
            if let Some(status) = ctx.done_status() {
                self.notify_failure(&status);
                warn!(
                    table = self.table_name,
                    status = %status,
                    attempts = self.stats.attempts,
                    "bulk apply stopped before next attempt"
                );
                self.stream_status = status;
                self.rows.exhaust(&self.stream_status);
                return;
            }

            self.stats.attempts += 1;
            let attempt = self.stats.attempts;
            let sent = self.rows.outstanding();
            debug!(
                table = self.table_name,
                attempt,
                rows = sent.len(),
                "sending bulk apply attempt"
            );
            let result = run_attempt(self.transport, self.table_name, &self.rows, sent, ctx, attempt)
                .await;
            let first_retryable = self.record(&result);
            self.stream_status = result.stream_status;

            let failure = if self.stream_status.is_ok() {
                first_retryable
            } else {
                Some(self.stream_status.clone())
            };
            let Some(failure) = failure else {
                continue;
            };

            let allowed = self.notify_failure(&failure);
            if !allowed || ctx.done_status().is_some() {
                if self.rows.has_outstanding() {
                    warn!(
                        table = self.table_name,
                        attempt,
                        status = %failure,
                        "retry budget exhausted; failing outstanding rows"
                    );
                }
                let stream_status = self.stream_status.clone();
                self.rows.exhaust(&stream_status);
                return;
            }
            if !self.rows.has_outstanding() {
                return;
            }

            let delay = self.policies.backoff.on_completion(&failure);
            debug!(
                table = self.table_name,
                attempt,
                status = %failure,
                delay_us = delay.as_micros() as u64,
                "backing off before retry"
            );
            backoff_wait(delay, ctx).await;
        }
    }

    /// Apply one attempt's statuses to the row table. Returns the status of
    /// the first row that became retryable, if any.
    fn record(&mut self, result: &AttemptResult) -> Option<Status> {
        let mut first_retryable = None;
        for (local, &original) in result.sent.iter().enumerate() {
            let outcome = match &result.reported[local] {
                Some(status) => {
                    if status.is_ok() {
                        self.stats.rows_succeeded += 1;
                    }
                    self.rows.record_reported(original, status.clone())
                }
                None => {
                    let status = if result.stream_status.is_ok() {
                        Status::undetermined()
                    } else {
                        result.stream_status.clone()
                    };
                    self.rows.record_undetermined(original, status)
                }
            };
            match outcome {
                RowOutcome::Retryable(s) if first_retryable.is_none() => {
                    first_retryable = Some(s.clone());
                }
                RowOutcome::PermanentlyFailed(s) => {
                    debug!(
                        table = self.table_name,
                        original_index = original,
                        status = %s,
                        "row failed permanently"
                    );
                }
                _ => {}
            }
        }
        first_retryable
    }

    fn notify_failure(&mut self, status: &Status) -> bool {
        self.stats.retry_notifications += 1;
        self.policies.retry.on_failure(status)
    }

    fn report(&self) -> FailureReport {
        FailureReport::new(
            self.stream_status.clone(),
            self.rows.failures(),
            self.stats.attempts,
            self.rows.len(),
        )
    }
}

/// Sleep for `delay`, returning early on cancellation or the call deadline.
async fn backoff_wait(delay: Duration, ctx: &CallContext) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = ctx.cancel.cancelled() => {}
        _ = sleep_until_opt(ctx.deadline) => {}
    }
}
