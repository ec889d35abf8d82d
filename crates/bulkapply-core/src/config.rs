use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::CallContext;
use crate::policy::{
    AlwaysRetry, ExponentialBackoff, LimitedErrorCount, LimitedTime, Policies, SafeIdempotent,
    DEFAULT_MAX_FAILURES,
};

/// Which mutations may be resent after a failed or undetermined attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyMode {
    /// Only mutations without server-assigned timestamps.
    #[default]
    Safe,
    /// Everything, accepting duplicate server-timestamped writes.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    pub policy: IdempotencyMode,
}

/// Retry budget (`[retry]` section in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryConfig {
    /// Stop after this many failed attempts.
    ErrorCount { max_failures: u32 },
    /// Stop retrying once this much time has passed since the first attempt.
    Time { max_duration_ms: u64 },
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::ErrorCount {
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

/// Exponential backoff parameters (`[backoff]` section in config.toml).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First delay in microseconds.
    pub initial_us: u64,
    /// Upper bound on the delay in microseconds.
    pub maximum_us: u64,
    /// Fraction in [0, 1] by which a delay may be shortened at random.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_us: 10_000,
            maximum_us: 30_000_000,
            jitter: ExponentialBackoff::DEFAULT_JITTER,
        }
    }
}

/// Global configuration loaded from `~/.config/bulkapply/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkApplyConfig {
    /// Table the CLI writes to.
    #[serde(default = "default_table")]
    pub table: String,
    /// Optional cap on a single attempt's stream, in milliseconds.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_table() -> String {
    "demo".to_string()
}

impl Default for BulkApplyConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            attempt_timeout_ms: None,
            idempotency: IdempotencyConfig::default(),
            retry: RetryConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Invalid values in an otherwise well-formed config.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("backoff.maximum_us ({maximum_us}) is below backoff.initial_us ({initial_us})")]
    BackoffRange { initial_us: u64, maximum_us: u64 },
    #[error("backoff.jitter must be within [0, 1], got {0}")]
    Jitter(f64),
    #[error("attempt_timeout_ms must be positive")]
    ZeroAttemptTimeout,
}

impl BulkApplyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backoff;
        if b.maximum_us < b.initial_us {
            return Err(ConfigError::BackoffRange {
                initial_us: b.initial_us,
                maximum_us: b.maximum_us,
            });
        }
        if !(0.0..=1.0).contains(&b.jitter) {
            return Err(ConfigError::Jitter(b.jitter));
        }
        if self.attempt_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroAttemptTimeout);
        }
        Ok(())
    }

    /// Policy prototypes described by this config.
    pub fn policies(&self) -> Result<Policies, ConfigError> {
        self.validate()?;
        let mut policies = Policies::default();
        policies = match self.idempotency.policy {
            IdempotencyMode::Safe => policies.with_idempotency(SafeIdempotent),
            IdempotencyMode::Always => policies.with_idempotency(AlwaysRetry),
        };
        policies = match self.retry {
            RetryConfig::ErrorCount { max_failures } => {
                policies.with_retry(LimitedErrorCount::new(max_failures))
            }
            RetryConfig::Time { max_duration_ms } => {
                policies.with_retry(LimitedTime::new(Duration::from_millis(max_duration_ms)))
            }
        };
        let backoff = ExponentialBackoff::new(
            Duration::from_micros(self.backoff.initial_us),
            Duration::from_micros(self.backoff.maximum_us),
        )
        .with_jitter(self.backoff.jitter);
        Ok(policies.with_backoff(backoff))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Call context carrying the configured attempt timeout.
    pub fn call_context(&self) -> CallContext {
        match self.attempt_timeout_ms {
            Some(ms) => CallContext::new().with_attempt_timeout(Duration::from_millis(ms)),
            None => CallContext::new(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("bulkapply")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BulkApplyConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = BulkApplyConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<BulkApplyConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: BulkApplyConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
