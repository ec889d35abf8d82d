//! Caller-supplied cancellation and deadlines for one bulk-apply call.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::status::Status;

/// Cancellation token, call deadline and per-attempt timeout.
///
/// Both the stream read and the backoff wait observe the token and the
/// deadline; either firing ends the current attempt as a failure.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
    /// Upper bound on a single attempt's stream.
    pub attempt_timeout: Option<Duration>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// `Some(status)` once the call was cancelled or its deadline passed.
    pub fn done_status(&self) -> Option<Status> {
        if self.cancel.is_cancelled() {
            return Some(Status::cancelled());
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => {
                Some(Status::deadline_exceeded("call deadline exceeded"))
            }
            _ => None,
        }
    }

    /// Earliest of the call deadline and `now + attempt_timeout`.
    pub(crate) fn attempt_deadline(&self) -> Option<Instant> {
        let per_attempt = self.attempt_timeout.map(|t| Instant::now() + t);
        match (self.deadline, per_attempt) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
