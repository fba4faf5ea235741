//! Worker tunables.

use std::time::Duration;

/// Knobs for the worker pool, the attempt loop, and the schedulers.
///
/// The server binary builds this from the environment; tests construct
/// it directly.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often the cancellation watcher polls the run status.
    pub cancel_poll_interval: Duration,
    /// Ceiling on the retry backoff, in seconds.
    pub max_backoff_seconds: i64,
    /// Jobs `running` longer than this without an update are reclaimed.
    /// 0 disables stale detection.
    pub requeue_stale_after_seconds: i64,
    /// Max runs re-published per kick-queued tick.
    pub kick_queued_limit: i64,
    /// Queued jobs younger than this are not kicked.
    pub kick_queued_min_age_seconds: i64,
    /// Base period of both schedulers (jitter is added per tick).
    pub scheduler_interval: Duration,
    /// Number of concurrent workers in the pool.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cancel_poll_interval: Duration::from_millis(750),
            max_backoff_seconds: 30,
            requeue_stale_after_seconds: 0,
            kick_queued_limit: 25,
            kick_queued_min_age_seconds: 30,
            scheduler_interval: Duration::from_secs(60),
            concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.cancel_poll_interval, Duration::from_millis(750));
        assert_eq!(config.max_backoff_seconds, 30);
        assert_eq!(config.requeue_stale_after_seconds, 0);
        assert_eq!(config.kick_queued_min_age_seconds, 30);
    }
}
