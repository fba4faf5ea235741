//! The persistent run store contract consumed by the orchestrator.

use crate::artifact::ArtifactRecord;
use crate::error::StoreError;
use crate::job::JobRecord;
use crate::message::MessageRecord;
use crate::pricing::ModelPricing;
use crate::run::{CompletionMeta, CreateRunParams, RunRecord, RunStatus, WorkspaceBackend};
use async_trait::async_trait;
use runforge_core::{ProjectId, RunId};

/// Persistent state of runs, jobs, artifacts, and messages, plus the
/// idempotency and claim primitives the orchestrator builds on.
///
/// Every mutating operation is a single-row write or a conditional
/// (compare-and-set) update, so concurrent workers synchronize through
/// the store rather than through shared memory.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Creates a run plus its job and initial `status {queued}` event,
    /// atomically.
    ///
    /// Enforces `(project_id, idempotency_key)` uniqueness: when a live
    /// run (any status except `error`) already matches, it is returned
    /// with `created = false` and nothing is changed.
    async fn create_run(
        &self,
        params: CreateRunParams,
    ) -> Result<(RunRecord, bool), StoreError>;

    /// Fetches a run by ID. Absent runs are `None`, not an error.
    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError>;

    /// Fetches a run scoped to a project.
    async fn get_run_in_project(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Option<RunRecord>, StoreError>;

    /// Returns the latest run of the project that continuation messages
    /// can still be threaded onto (not failed, not cancelled).
    async fn latest_writable_run(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RunRecord>, StoreError>;

    /// Compare-and-set claim: transitions the job `queued -> running` iff
    /// it is currently `queued` and the run is not terminal.
    ///
    /// Exactly one of any number of racing workers observes `true`.
    async fn claim_run_for_execution(&self, run_id: RunId) -> Result<bool, StoreError>;

    /// Records the attempt counter on the run.
    async fn set_run_execution_attempt(
        &self,
        run_id: RunId,
        attempt: i32,
        max_attempts: i32,
    ) -> Result<(), StoreError>;

    /// Persists or clears the sandbox owned by the live attempt.
    async fn set_run_sandbox_id(
        &self,
        run_id: RunId,
        sandbox_id: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Persists the effective workspace backend.
    async fn set_run_workspace_backend(
        &self,
        run_id: RunId,
        backend: WorkspaceBackend,
    ) -> Result<(), StoreError>;

    /// Transitions the run status, rejecting transitions that violate the
    /// state machine (terminal stickiness included).
    async fn update_run_status(&self, run_id: RunId, status: RunStatus)
    -> Result<(), StoreError>;

    /// Finishes the run successfully: `running -> completed`, writing
    /// output, usage, cost, and `completed_at`. Also records the output as
    /// an assistant message.
    async fn complete_run(
        &self,
        run_id: RunId,
        output: &str,
        meta: CompletionMeta,
    ) -> Result<(), StoreError>;

    /// Finishes the run with an error: `running -> error`.
    async fn fail_run(&self, run_id: RunId, error: &str) -> Result<(), StoreError>;

    /// Cancels the run. Accepts `queued`, `running`, and (idempotently)
    /// `cancelled`; other terminal statuses are left untouched.
    ///
    /// Returns `(resulting status, whether this call performed the
    /// transition)`, or `None` when the run does not exist.
    async fn cancel_run(&self, run_id: RunId)
    -> Result<Option<(RunStatus, bool)>, StoreError>;

    /// Reverts the run to `queued` for a retry (`running -> queued`).
    async fn queue_run_for_retry(&self, run_id: RunId) -> Result<(), StoreError>;

    /// Records a failed attempt on the job: when `attempts <
    /// max_attempts`, the job goes back to `queued` with `next_run_at =
    /// now + delay`; otherwise it becomes `failed`.
    async fn mark_job_failed(
        &self,
        run_id: RunId,
        attempts: i32,
        delay_seconds: i64,
    ) -> Result<(), StoreError>;

    /// Marks the job `succeeded`.
    async fn mark_job_succeeded(&self, run_id: RunId) -> Result<(), StoreError>;

    /// Marks the job `cancelled`.
    async fn mark_job_cancelled(&self, run_id: RunId) -> Result<(), StoreError>;

    /// Fetches the job paired with a run.
    async fn get_job(&self, run_id: RunId) -> Result<Option<JobRecord>, StoreError>;

    /// Atomically flips every `running` job whose `updated_at` is older
    /// than the threshold back to `queued`, returning the affected run
    /// IDs. Protects against workers dying mid-attempt.
    async fn requeue_stale_running_jobs(
        &self,
        stale_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError>;

    /// Lists `queued` jobs that are claimable now (`next_run_at <= now`)
    /// and have been idle at least `min_queued_age_seconds`, oldest
    /// first. Protects against lost queue deliveries.
    async fn list_runnable_queued_job_run_ids(
        &self,
        limit: i64,
        min_queued_age_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError>;

    /// Records an artifact row.
    async fn record_artifact(&self, artifact: &ArtifactRecord) -> Result<(), StoreError>;

    /// Lists artifacts for a run.
    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactRecord>, StoreError>;

    /// Appends a chat message.
    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError>;

    /// Lists the chat thread for a run, oldest first.
    async fn list_messages(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Looks up pricing for a provider/model pair.
    async fn model_pricing(
        &self,
        provider: &str,
        model: &str,
    ) -> Result<Option<ModelPricing>, StoreError>;
}
