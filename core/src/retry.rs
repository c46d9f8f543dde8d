//! Bounded retry with exponential backoff for conflicting transactions

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 10,
            max_backoff_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    pub fn should_retry(&self, attempt: u32, err: &LedgerError) -> bool {
        err.is_retryable() && attempt < self.max_attempts
    }

    /// Blocking retry loop for callers outside an async runtime
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Err(e) if self.should_retry(attempt, &e) => {
                    log::debug!("Retrying after conflict (attempt {})", attempt);
                    std::thread::sleep(self.backoff(attempt));
                }
                other => return other,
            }
        }
    }
}
