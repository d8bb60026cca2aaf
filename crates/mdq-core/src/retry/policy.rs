use std::time::Duration;

use crate::config::DownloadConfig;
use crate::model::DownloadTask;

use super::TransferError;

/// Exponential backoff with a retry budget, built from the live `DownloadConfig`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retry_count: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &DownloadConfig) -> Self {
        Self {
            max_retry_count: cfg.max_retry_count,
            base_delay: Duration::from_millis(cfg.base_retry_delay_ms),
        }
    }

    /// Backoff before retry number `attempt` (1-based): base * 2^(attempt-1).
    /// Saturates instead of overflowing.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// True iff the error is retryable and the task still has budget left.
    pub fn should_retry(&self, task: &DownloadTask, error: &TransferError) -> bool {
        error.retryable() && task.retry_count < self.max_retry_count
    }
}
