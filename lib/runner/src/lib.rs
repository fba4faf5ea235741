//! The runforge orchestrator: run supervision, cancellation, and
//! queue/store reconciliation.
//!
//! A worker receives `RunRequested` deliveries, claims the run through
//! the store's compare-and-set, executes attempts through the agent
//! driver under a retry budget, and finishes the run with exactly one
//! terminal event. Periodic schedulers reconcile durable job state
//! against lost deliveries and dead workers.

pub mod config;
pub mod error;
pub mod hook;
pub mod scheduler;
pub mod supervisor;
pub mod watcher;
pub mod worker;

pub use config::WorkerConfig;
pub use error::RunnerError;
pub use hook::{CommitOutcome, NoopPostCommitHook, PostCommitHook};
pub use scheduler::{
    kick_queued_once, requeue_stale_once, run_kick_queued_loop, run_requeue_stale_loop,
};
pub use supervisor::RunSupervisor;
pub use watcher::CancellationWatcher;
pub use worker::WorkerPool;
