//! Retry with exponential backoff for sandbox API calls.

use crate::error::SandboxError;
use std::future::Future;
use std::time::Duration;

/// Message fragments that mark a provider error as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection reset",
    "connection refused",
    "connection closed",
    "socket hang up",
    "econnreset",
    "etimedout",
    "fetch failed",
    "timed out",
    "timeout",
    "429",
    "502",
    "503",
    "504",
];

/// Retry policy for sandbox API calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to sleep after the given 1-based attempt fails:
    /// `min(max_delay, base_delay * 2^(attempt-1))` plus a small
    /// deterministic jitter derived from the attempt counter.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let scaled = self.base_delay.saturating_mul(1u32 << exp);
        let capped = scaled.min(self.max_delay);
        let jitter = Duration::from_millis(u64::from(attempt) * 97 % 250);
        capped + jitter
    }
}

/// Returns true when an error message matches the known transient set
/// (connection resets, 429/502/503/504, fetch failures, timeouts).
#[must_use]
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Runs `op`, retrying transient failures per the policy. Non-transient
/// errors and the final attempt's error surface unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, SandboxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SandboxError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(e.message()) => {
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
