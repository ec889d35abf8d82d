use std::time::Duration;

use rand::Rng;

use crate::status::Status;

/// Computes how long to wait before the next attempt.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Called once per retried attempt; returns the delay to sleep.
    fn on_completion(&mut self, status: &Status) -> Duration;

    /// A new instance starting again from the initial delay.
    fn fresh(&self) -> Box<dyn BackoffPolicy>;
}

/// Exponential backoff with caps.
///
/// The base delay starts at `initial` and doubles on every call, capped at
/// `maximum`. Jitter only shortens a delay, so the cap holds exactly: the
/// returned delay is drawn from `[base * (1 - jitter), base]`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    maximum: Duration,
    jitter: f64,
    current: Duration,
}

impl ExponentialBackoff {
    /// Default jitter fraction.
    pub const DEFAULT_JITTER: f64 = 0.1;

    pub fn new(initial: Duration, maximum: Duration) -> Self {
        let maximum = maximum.max(initial);
        Self {
            initial,
            maximum,
            jitter: Self::DEFAULT_JITTER,
            current: initial,
        }
    }

    /// Set the jitter fraction (clamped to `[0, 1]`; `0` = deterministic).
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
        self
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn maximum(&self) -> Duration {
        self.maximum
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Return the current base delay and advance to the next one.
    fn next_base(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.saturating_mul(2).min(self.maximum);
        base
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(30))
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn on_completion(&mut self, _status: &Status) -> Duration {
        let base = self.next_base();
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let upper = base.as_nanos() as f64;
        let lower = upper * (1.0 - self.jitter);
        let nanos = rand::rng().random_range(lower..=upper);
        Duration::from_nanos(nanos as u64).min(base)
    }

    fn fresh(&self) -> Box<dyn BackoffPolicy> {
        Box::new(Self {
            current: self.initial,
            ..*self
        })
    }
}
