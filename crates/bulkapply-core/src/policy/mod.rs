//! Idempotency, retry and backoff policies.
//!
//! A `Policies` value holds prototypes. Every bulk-apply call asks it for
//! fresh stateful instances, so concurrent calls never share counters.

mod backoff;
mod classify;
mod idempotency;
mod retry;

use std::sync::Arc;

pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use classify::{classify, classify_code, is_transient, StatusKind};
pub use idempotency::{AlwaysRetry, IdempotencyPolicy, SafeIdempotent};
pub use retry::{LimitedErrorCount, LimitedTime, RetryPolicy};

/// Default number of failed attempts tolerated by `Policies::default()`.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Policy prototypes for a table handle.
#[derive(Debug)]
pub struct Policies {
    pub idempotency: Arc<dyn IdempotencyPolicy>,
    pub retry: Box<dyn RetryPolicy>,
    pub backoff: Box<dyn BackoffPolicy>,
}

impl Policies {
    pub fn new(
        idempotency: Arc<dyn IdempotencyPolicy>,
        retry: Box<dyn RetryPolicy>,
        backoff: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            idempotency,
            retry,
            backoff,
        }
    }

    pub fn with_idempotency(mut self, policy: impl IdempotencyPolicy + 'static) -> Self {
        self.idempotency = Arc::new(policy);
        self
    }

    pub fn with_retry(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(policy);
        self
    }

    pub fn with_backoff(mut self, policy: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(policy);
        self
    }

    /// Independent instances for one call.
    pub fn for_call(&self) -> CallPolicies {
        CallPolicies {
            idempotency: Arc::clone(&self.idempotency),
            retry: self.retry.fresh(),
            backoff: self.backoff.fresh(),
        }
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            idempotency: Arc::new(SafeIdempotent),
            retry: Box::new(LimitedErrorCount::new(DEFAULT_MAX_FAILURES)),
            backoff: Box::new(ExponentialBackoff::default()),
        }
    }
}

impl Clone for Policies {
    fn clone(&self) -> Self {
        let call = self.for_call();
        Self {
            idempotency: call.idempotency,
            retry: call.retry,
            backoff: call.backoff,
        }
    }
}

/// Policy instances owned by a single bulk-apply call.
#[derive(Debug)]
pub struct CallPolicies {
    pub idempotency: Arc<dyn IdempotencyPolicy>,
    pub retry: Box<dyn RetryPolicy>,
    pub backoff: Box<dyn BackoffPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Code, Status};

    #[test]
    fn calls_get_independent_retry_budgets() {
        let policies = Policies::default().with_retry(LimitedErrorCount::new(1));
        let st = Status::from_code(Code::Unavailable);
        let mut first = policies.for_call();
        assert!(first.retry.on_failure(&st));
        assert!(!first.retry.on_failure(&st));
        let mut second = policies.for_call();
        assert!(second.retry.on_failure(&st));
    }
}
