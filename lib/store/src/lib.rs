//! Persistent run state for the runforge platform.
//!
//! This crate provides:
//!
//! - **Records**: runs, jobs, artifacts, chat messages, model pricing
//! - **Status machinery**: the run/job state machines with sticky
//!   terminal states
//! - **`RunStore`**: the contract the orchestrator consumes, including
//!   the idempotent create and the claim compare-and-set
//! - **Implementations**: Postgres for production, in-memory for tests

pub mod artifact;
pub mod error;
pub mod job;
pub mod memory;
pub mod message;
pub mod postgres;
pub mod pricing;
pub mod run;
pub mod store;

pub use artifact::{ArtifactRecord, workspace_snapshot_key};
pub use error::StoreError;
pub use job::{JobRecord, JobStatus, retry_delay_seconds};
pub use memory::InMemoryRunStore;
pub use message::{MessageRecord, MessageRole};
pub use postgres::PgRunStore;
pub use pricing::{ModelPricing, estimate_cost_usd};
pub use run::{
    CompletionMeta, CreateRunParams, RunRecord, RunStatus, WorkspaceBackend,
};
pub use store::RunStore;
