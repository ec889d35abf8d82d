use std::time::Duration;

use tokio::time::Instant;

use super::classify::is_transient;
use crate::status::Status;

/// Decides whether another attempt may follow a failed one.
///
/// A bulk-apply call notifies the policy once per attempt that had any
/// failure (stream-level or per-row). Implementations carry per-call state;
/// `fresh` hands out an independent instance with reset counters.
pub trait RetryPolicy: Send + Sync + std::fmt::Debug {
    /// Record a failed attempt. Returns `true` if another attempt is allowed.
    fn on_failure(&mut self, status: &Status) -> bool;

    /// A new instance with the same limits and no recorded failures.
    fn fresh(&self) -> Box<dyn RetryPolicy>;
}

/// Tolerate at most `max_failures` failed attempts.
#[derive(Debug, Clone, Copy)]
pub struct LimitedErrorCount {
    max_failures: u32,
    failures: u32,
}

impl LimitedErrorCount {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            failures: 0,
        }
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl RetryPolicy for LimitedErrorCount {
    fn on_failure(&mut self, status: &Status) -> bool {
        if !is_transient(status) {
            return false;
        }
        self.failures = self.failures.saturating_add(1);
        self.failures <= self.max_failures
    }

    fn fresh(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.max_failures))
    }
}

/// Keep retrying while less than `max_duration` has passed since the
/// policy instance was created.
#[derive(Debug, Clone, Copy)]
pub struct LimitedTime {
    max_duration: Duration,
    started: Instant,
}

impl LimitedTime {
    pub fn new(max_duration: Duration) -> Self {
        Self {
            max_duration,
            started: Instant::now(),
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }
}

impl RetryPolicy for LimitedTime {
    fn on_failure(&mut self, status: &Status) -> bool {
        if !is_transient(status) {
            return false;
        }
        self.started.elapsed() < self.max_duration
    }

    fn fresh(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.max_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    #[test]
    fn error_count_allows_exactly_max_failures() {
        let mut p = LimitedErrorCount::new(2);
        let aborted = Status::from_code(Code::Aborted);
        assert!(p.on_failure(&aborted));
        assert!(p.on_failure(&aborted));
        assert!(!p.on_failure(&aborted));
        assert_eq!(p.failures(), 3);
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut p = LimitedErrorCount::new(0);
        assert!(!p.on_failure(&Status::from_code(Code::Unavailable)));
    }

    #[test]
    fn permanent_status_stops_without_spending_budget() {
        let mut p = LimitedErrorCount::new(1);
        assert!(!p.on_failure(&Status::new(Code::FailedPrecondition, "no such table")));
        assert_eq!(p.failures(), 0);
        assert!(p.on_failure(&Status::from_code(Code::Unavailable)));
    }

    #[test]
    fn fresh_resets_counters() {
        let mut p = LimitedErrorCount::new(1);
        let st = Status::from_code(Code::Unavailable);
        assert!(p.on_failure(&st));
        assert!(!p.on_failure(&st));
        let mut q = p.fresh();
        assert!(q.on_failure(&st));
    }

    #[tokio::test(start_paused = true)]
    async fn limited_time_expires() {
        let mut p = LimitedTime::new(Duration::from_millis(100));
        let st = Status::from_code(Code::DeadlineExceeded);
        assert!(p.on_failure(&st));
        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(p.on_failure(&st));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!p.on_failure(&st));
        assert!(p.fresh().on_failure(&st));
    }
}
