//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded from environment variables via
//! the `config` crate. Library crates never read the environment; the
//! server translates these knobs into their plain config structs.

use runforge_agent::{ModelSelector, PhaseTimeouts};
use runforge_runner::WorkerConfig;
use runforge_sandbox::{RetryPolicy, SandboxConfig, SnapshotLimits};
use runforge_store::WorkspaceBackend;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Cap on attempts per run; also the default budget for new runs.
    #[serde(default = "default_max_job_attempts")]
    pub max_job_attempts: i32,

    /// Reclaim jobs stuck in `running` after this many seconds.
    /// 0 disables reclamation.
    #[serde(default)]
    pub worker_requeue_running_after_s: i64,

    /// Retry backoff ceiling in seconds.
    #[serde(default = "default_worker_max_backoff")]
    pub worker_max_backoff: i64,

    /// Max runs re-published per kick-queued pass.
    #[serde(default = "default_worker_kick_queued_limit")]
    pub worker_kick_queued_limit: i64,

    /// Queued jobs younger than this many seconds are not kicked.
    #[serde(default = "default_worker_kick_queued_min_age_s")]
    pub worker_kick_queued_min_age_s: i64,

    /// Number of concurrent workers.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Cancellation watcher poll period in milliseconds.
    #[serde(default = "default_cancel_poll_interval_ms")]
    pub cancel_poll_interval_ms: u64,

    /// Scheduler base period in seconds.
    #[serde(default = "default_scheduler_interval_s")]
    pub scheduler_interval_s: u64,

    /// Agent planning-phase budget in milliseconds.
    #[serde(default = "default_agent_plan_phase_timeout_ms")]
    pub agent_plan_phase_timeout_ms: u64,

    /// Agent build-phase budget in milliseconds.
    #[serde(default = "default_agent_build_phase_timeout_ms")]
    pub agent_build_phase_timeout_ms: u64,

    /// Default workspace backend for new runs (`host` or `e2b`).
    #[serde(default)]
    pub agent_workspace_backend: Option<String>,

    /// Environment-supplied model provider.
    #[serde(default)]
    pub agent_provider: Option<String>,

    /// Environment-supplied model.
    #[serde(default)]
    pub agent_model: Option<String>,

    /// Sandbox template name.
    #[serde(default = "default_e2b_template")]
    pub e2b_template: String,

    /// Sandbox lifetime timeout in milliseconds.
    #[serde(default = "default_e2b_sandbox_timeout_ms")]
    pub e2b_sandbox_timeout_ms: u64,

    /// Soft timeout for sandbox commands in milliseconds.
    #[serde(default = "default_e2b_cmd_timeout_ms")]
    pub e2b_cmd_timeout_ms: u64,

    /// Grace added to the soft command timeout in milliseconds.
    #[serde(default = "default_e2b_hard_timeout_grace_ms")]
    pub e2b_hard_timeout_grace_ms: u64,

    /// Sandbox API retry attempts.
    #[serde(default = "default_e2b_retry_attempts")]
    pub e2b_retry_attempts: u32,

    /// Sandbox API retry base delay in milliseconds.
    #[serde(default = "default_e2b_retry_base_delay_ms")]
    pub e2b_retry_base_delay_ms: u64,

    /// Sandbox API retry delay ceiling in milliseconds.
    #[serde(default = "default_e2b_retry_max_delay_ms")]
    pub e2b_retry_max_delay_ms: u64,

    /// Directory the agent works in inside the sandbox.
    #[serde(default = "default_e2b_workspace_root")]
    pub e2b_workspace_root: String,

    /// Snapshot byte budget.
    #[serde(default = "default_zip_max_bytes")]
    pub zip_max_bytes: u64,

    /// Snapshot file-count budget.
    #[serde(default = "default_zip_max_files")]
    pub zip_max_files: usize,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_max_job_attempts() -> i32 {
    3
}

fn default_worker_max_backoff() -> i64 {
    30
}

fn default_worker_kick_queued_limit() -> i64 {
    25
}

fn default_worker_kick_queued_min_age_s() -> i64 {
    30
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_cancel_poll_interval_ms() -> u64 {
    750
}

fn default_scheduler_interval_s() -> u64 {
    60
}

fn default_agent_plan_phase_timeout_ms() -> u64 {
    60 * 60 * 1000
}

fn default_agent_build_phase_timeout_ms() -> u64 {
    10 * 60 * 60 * 1000
}

fn default_e2b_template() -> String {
    "base".to_string()
}

fn default_e2b_sandbox_timeout_ms() -> u64 {
    2 * 60 * 60 * 1000
}

fn default_e2b_cmd_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_e2b_hard_timeout_grace_ms() -> u64 {
    15 * 1000
}

fn default_e2b_retry_attempts() -> u32 {
    3
}

fn default_e2b_retry_base_delay_ms() -> u64 {
    750
}

fn default_e2b_retry_max_delay_ms() -> u64 {
    8000
}

fn default_e2b_workspace_root() -> String {
    "/home/user/app".to_string()
}

fn default_zip_max_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_zip_max_files() -> usize {
    20_000
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Worker/scheduler tunables for the runner crate.
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            cancel_poll_interval: Duration::from_millis(self.cancel_poll_interval_ms),
            max_backoff_seconds: self.worker_max_backoff,
            requeue_stale_after_seconds: self.worker_requeue_running_after_s,
            kick_queued_limit: self.worker_kick_queued_limit,
            kick_queued_min_age_seconds: self.worker_kick_queued_min_age_s,
            scheduler_interval: Duration::from_secs(self.scheduler_interval_s),
            concurrency: self.worker_concurrency,
        }
    }

    /// Sandbox configuration for e2b-backed attempts.
    #[must_use]
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            template: self.e2b_template.clone(),
            sandbox_timeout: Duration::from_millis(self.e2b_sandbox_timeout_ms),
            command_timeout: Duration::from_millis(self.e2b_cmd_timeout_ms),
            hard_timeout_grace: Duration::from_millis(self.e2b_hard_timeout_grace_ms),
            workspace_root: self.e2b_workspace_root.clone(),
            retry: RetryPolicy {
                attempts: self.e2b_retry_attempts,
                base_delay: Duration::from_millis(self.e2b_retry_base_delay_ms),
                max_delay: Duration::from_millis(self.e2b_retry_max_delay_ms),
            },
            limits: SnapshotLimits {
                max_files: self.zip_max_files,
                max_bytes: self.zip_max_bytes,
            },
        }
    }

    /// Phase timeouts bounding the agent call.
    #[must_use]
    pub fn phase_timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            plan: Duration::from_millis(self.agent_plan_phase_timeout_ms),
            build: Duration::from_millis(self.agent_build_phase_timeout_ms),
        }
    }

    /// Model selector seeded with the environment pair.
    #[must_use]
    pub fn model_selector(&self) -> ModelSelector {
        ModelSelector::new(self.agent_provider.clone(), self.agent_model.clone())
    }

    /// Default workspace backend for new runs.
    #[must_use]
    pub fn default_workspace_backend(&self) -> WorkspaceBackend {
        self.agent_workspace_backend
            .as_deref()
            .map(WorkspaceBackend::from_str_value)
            .unwrap_or(WorkspaceBackend::Host)
    }
}
