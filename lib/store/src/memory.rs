//! In-memory run store for tests and single-process setups.

use crate::artifact::ArtifactRecord;
use crate::error::StoreError;
use crate::job::{JobRecord, JobStatus};
use crate::message::{MessageRecord, MessageRole};
use crate::pricing::ModelPricing;
use crate::run::{CompletionMeta, CreateRunParams, RunRecord, RunStatus, WorkspaceBackend};
use crate::store::RunStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use runforge_core::{ProjectId, RunId};
use runforge_journal::{EventJournal, EventType, InMemoryJournal};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct StoreState {
    runs: HashMap<RunId, RunRecord>,
    jobs: HashMap<RunId, JobRecord>,
    artifacts: Vec<ArtifactRecord>,
    messages: Vec<MessageRecord>,
    pricing: HashMap<(String, String), ModelPricing>,
}

/// In-memory [`RunStore`] implementation.
///
/// Shares a journal so `create_run` writes its initial `status {queued}`
/// event the same way the Postgres transaction does. The single mutex
/// makes every operation atomic, which is exactly the conditional-update
/// semantics the SQL implementation gets per statement.
#[derive(Clone)]
pub struct InMemoryRunStore {
    state: Arc<Mutex<StoreState>>,
    journal: InMemoryJournal,
}

impl InMemoryRunStore {
    /// Creates an empty store sharing the given journal.
    #[must_use]
    pub fn new(journal: InMemoryJournal) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            journal,
        }
    }

    /// Seeds a pricing row for cost-estimation tests.
    pub fn insert_pricing(&self, pricing: ModelPricing) {
        self.state.lock().pricing.insert(
            (pricing.provider.clone(), pricing.model.clone()),
            pricing,
        );
    }

    /// Ages a job's `updated_at` by `seconds`, for stale-detection tests.
    pub fn backdate_job(&self, run_id: RunId, seconds: i64) {
        if let Some(job) = self.state.lock().jobs.get_mut(&run_id) {
            job.updated_at -= Duration::seconds(seconds);
        }
    }

    fn touch_job(job: &mut JobRecord) {
        job.updated_at = Utc::now();
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(
        &self,
        params: CreateRunParams,
    ) -> Result<(RunRecord, bool), StoreError> {
        let run = {
            let mut state = self.state.lock();

            if let Some(key) = &params.idempotency_key {
                let existing = state
                    .runs
                    .values()
                    .find(|r| {
                        r.project_id == params.project_id
                            && r.idempotency_key.as_deref() == Some(key)
                            && r.status != RunStatus::Error
                    })
                    .cloned();
                if let Some(run) = existing {
                    return Ok((run, false));
                }
            }

            let run_index = state
                .runs
                .values()
                .filter(|r| r.project_id == params.project_id)
                .map(|r| r.run_index)
                .max()
                .unwrap_or(0)
                + 1;

            let now = Utc::now();
            let run = RunRecord {
                id: RunId::new(),
                project_id: params.project_id,
                parent_run_id: params.parent_run_id,
                run_index,
                idempotency_key: params.idempotency_key.clone(),
                prompt: params.prompt.clone(),
                input: params.input.clone(),
                provider: params.provider.clone(),
                model: params.model.clone(),
                workspace_backend: params.workspace_backend,
                status: RunStatus::Queued,
                attempt: 0,
                max_attempts: params.max_attempts,
                sandbox_id: None,
                output: None,
                error: None,
                usage: None,
                duration_ms: None,
                cost_currency: "usd".to_string(),
                estimated_cost_usd: None,
                pricing_version: None,
                created_at: now,
                started_at: None,
                completed_at: None,
                updated_at: now,
            };

            state.runs.insert(run.id, run.clone());
            state.jobs.insert(
                run.id,
                JobRecord {
                    run_id: run.id,
                    status: JobStatus::Queued,
                    attempts: 0,
                    max_attempts: params.max_attempts,
                    next_run_at: now,
                    created_at: now,
                    updated_at: now,
                },
            );
            state.messages.push(MessageRecord::new(
                params.project_id,
                run.id,
                MessageRole::User,
                params.prompt,
            ));
            run
        };

        self.journal
            .append(run.id, EventType::Status, json!({"status": "queued"}))
            .await
            .map_err(|e| StoreError::Query {
                message: e.to_string(),
            })?;

        Ok((run, true))
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.state.lock().runs.get(&run_id).cloned())
    }

    async fn get_run_in_project(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Option<RunRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .runs
            .get(&run_id)
            .filter(|r| r.project_id == project_id)
            .cloned())
    }

    async fn latest_writable_run(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RunRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .runs
            .values()
            .filter(|r| {
                r.project_id == project_id
                    && !matches!(r.status, RunStatus::Error | RunStatus::Cancelled)
            })
            .max_by_key(|r| r.run_index)
            .cloned())
    }

    async fn claim_run_for_execution(&self, run_id: RunId) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let run_claimable = state
            .runs
            .get(&run_id)
            .is_some_and(|r| !r.status.is_terminal());
        if !run_claimable {
            return Ok(false);
        }
        match state.jobs.get_mut(&run_id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Running;
                Self::touch_job(job);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_run_execution_attempt(
        &self,
        run_id: RunId,
        attempt: i32,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        run.attempt = attempt;
        run.max_attempts = max_attempts;
        if run.started_at.is_none() {
            run.started_at = Some(Utc::now());
        }
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn set_run_sandbox_id(
        &self,
        run_id: RunId,
        sandbox_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        run.sandbox_id = sandbox_id.map(str::to_string);
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn set_run_workspace_backend(
        &self,
        run_id: RunId,
        backend: WorkspaceBackend,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        run.workspace_backend = backend;
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        if !run.status.can_transition(status) {
            return Err(StoreError::InvalidTransition {
                run_id,
                from: run.status,
                to: status,
            });
        }
        run.status = status;
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn complete_run(
        &self,
        run_id: RunId,
        output: &str,
        meta: CompletionMeta,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        if run.status != RunStatus::Running {
            return Err(StoreError::InvalidTransition {
                run_id,
                from: run.status,
                to: RunStatus::Completed,
            });
        }
        run.status = RunStatus::Completed;
        run.output = Some(output.to_string());
        if meta.provider.is_some() {
            run.provider = meta.provider;
        }
        if meta.model.is_some() {
            run.model = meta.model;
        }
        run.usage = meta.usage;
        run.duration_ms = meta.duration_ms;
        run.estimated_cost_usd = meta.estimated_cost_usd;
        run.pricing_version = meta.pricing_version;
        run.completed_at = Some(Utc::now());
        run.updated_at = Utc::now();
        let message = MessageRecord::new(
            run.project_id,
            run_id,
            MessageRole::Assistant,
            output,
        );
        state.messages.push(message);
        Ok(())
    }

    async fn fail_run(&self, run_id: RunId, error: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        if run.status != RunStatus::Running {
            return Err(StoreError::InvalidTransition {
                run_id,
                from: run.status,
                to: RunStatus::Error,
            });
        }
        run.status = RunStatus::Error;
        run.error = Some(error.to_string());
        run.completed_at = Some(Utc::now());
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel_run(
        &self,
        run_id: RunId,
    ) -> Result<Option<(RunStatus, bool)>, StoreError> {
        let mut state = self.state.lock();
        let Some(run) = state.runs.get_mut(&run_id) else {
            return Ok(None);
        };
        match run.status {
            RunStatus::Queued | RunStatus::Running => {
                run.status = RunStatus::Cancelled;
                run.completed_at = Some(Utc::now());
                run.updated_at = Utc::now();
                Ok(Some((RunStatus::Cancelled, true)))
            }
            status => Ok(Some((status, false))),
        }
    }

    async fn queue_run_for_retry(&self, run_id: RunId) -> Result<(), StoreError> {
        self.update_run_status(run_id, RunStatus::Queued).await
    }

    async fn mark_job_failed(
        &self,
        run_id: RunId,
        attempts: i32,
        delay_seconds: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        job.attempts = attempts;
        if attempts < job.max_attempts {
            job.status = JobStatus::Queued;
            job.next_run_at = Utc::now() + Duration::seconds(delay_seconds);
        } else {
            job.status = JobStatus::Failed;
        }
        Self::touch_job(job);
        Ok(())
    }

    async fn mark_job_succeeded(&self, run_id: RunId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        job.status = JobStatus::Succeeded;
        Self::touch_job(job);
        Ok(())
    }

    async fn mark_job_cancelled(&self, run_id: RunId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let job = state
            .jobs
            .get_mut(&run_id)
            .ok_or(StoreError::RunNotFound { run_id })?;
        job.status = JobStatus::Cancelled;
        Self::touch_job(job);
        Ok(())
    }

    async fn get_job(&self, run_id: RunId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.state.lock().jobs.get(&run_id).cloned())
    }

    async fn requeue_stale_running_jobs(
        &self,
        stale_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError> {
        let threshold = Utc::now() - Duration::seconds(stale_seconds);
        let mut state = self.state.lock();
        let mut requeued = Vec::new();
        for job in state.jobs.values_mut() {
            if job.status == JobStatus::Running && job.updated_at < threshold {
                job.status = JobStatus::Queued;
                job.next_run_at = Utc::now();
                Self::touch_job(job);
                requeued.push(job.run_id);
            }
        }
        Ok(requeued)
    }

    async fn list_runnable_queued_job_run_ids(
        &self,
        limit: i64,
        min_queued_age_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError> {
        let now = Utc::now();
        let age_threshold = now - Duration::seconds(min_queued_age_seconds);
        let mut runnable: Vec<JobRecord> = self
            .state
            .lock()
            .jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Queued
                    && j.next_run_at <= now
                    && j.updated_at <= age_threshold
            })
            .cloned()
            .collect();
        runnable.sort_by_key(|j| j.updated_at);
        Ok(runnable
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|j| j.run_id)
            .collect())
    }

    async fn record_artifact(&self, artifact: &ArtifactRecord) -> Result<(), StoreError> {
        self.state.lock().artifacts.push(artifact.clone());
        Ok(())
    }

    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .artifacts
            .iter()
            .filter(|a| a.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError> {
        self.state.lock().messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| m.project_id == project_id && m.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn model_pricing(
        &self,
        provider: &str,
        model: &str,
    ) -> Result<Option<ModelPricing>, StoreError> {
        Ok(self
            .state
            .lock()
            .pricing
            .get(&(provider.to_string(), model.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::retry_delay_seconds;
    use runforge_core::Usage;

    fn store() -> InMemoryRunStore {
        InMemoryRunStore::new(InMemoryJournal::new())
    }

    fn params(project_id: ProjectId) -> CreateRunParams {
        CreateRunParams::new(project_id, "add a healthcheck endpoint")
    }

    #[tokio::test]
    async fn create_run_inserts_run_job_event_and_message() {
        let journal = InMemoryJournal::new();
        let store = InMemoryRunStore::new(journal.clone());
        let project_id = ProjectId::new();

        let (run, created) = store.create_run(params(project_id)).await.unwrap();
        assert!(created);
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.run_index, 1);

        let job = store.get_job(run.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);

        assert_eq!(journal.status_trail(run.id), vec!["queued"]);

        let messages = store.list_messages(project_id, run.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn run_index_is_monotonic_per_project() {
        let store = store();
        let project_id = ProjectId::new();

        let (first, _) = store.create_run(params(project_id)).await.unwrap();
        let (second, _) = store.create_run(params(project_id)).await.unwrap();
        let (other, _) = store.create_run(params(ProjectId::new())).await.unwrap();

        assert_eq!(first.run_index, 1);
        assert_eq!(second.run_index, 2);
        assert_eq!(other.run_index, 1);
    }

    #[tokio::test]
    async fn create_run_is_idempotent_by_project_and_key() {
        let store = store();
        let project_id = ProjectId::new();
        let mut p = params(project_id);
        p.idempotency_key = Some("k1".to_string());

        let (first, created_first) = store.create_run(p.clone()).await.unwrap();
        let (second, created_second) = store.create_run(p.clone()).await.unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.id, second.id);

        // Same key in another project is a different run.
        let mut other = params(ProjectId::new());
        other.idempotency_key = Some("k1".to_string());
        let (third, created_third) = store.create_run(other).await.unwrap();
        assert!(created_third);
        assert_ne!(third.id, first.id);
    }

    #[tokio::test]
    async fn idempotency_ignores_dead_runs() {
        let store = store();
        let project_id = ProjectId::new();
        let mut p = params(project_id);
        p.idempotency_key = Some("k1".to_string());

        let (first, _) = store.create_run(p.clone()).await.unwrap();
        store.claim_run_for_execution(first.id).await.unwrap();
        store
            .update_run_status(first.id, RunStatus::Running)
            .await
            .unwrap();
        store.fail_run(first.id, "boom").await.unwrap();

        let (second, created) = store.create_run(p).await.unwrap();
        assert!(created);
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn claim_has_exactly_one_winner() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let run_id = run.id;
            handles.push(tokio::spawn(async move {
                store.claim_run_for_execution(run_id).await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn claim_refuses_terminal_runs() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        store.cancel_run(run.id).await.unwrap();

        assert!(!store.claim_run_for_execution(run.id).await.unwrap());
    }

    #[tokio::test]
    async fn terminal_status_is_sticky() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        store.claim_run_for_execution(run.id).await.unwrap();
        store
            .update_run_status(run.id, RunStatus::Running)
            .await
            .unwrap();
        store
            .complete_run(run.id, "done", CompletionMeta::default())
            .await
            .unwrap();

        let err = store
            .update_run_status(run.id, RunStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let err = store.fail_run(run.id, "late failure").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn complete_run_requires_running() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();

        let err = store
            .complete_run(run.id, "too early", CompletionMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn complete_run_records_usage_and_assistant_message() {
        let store = store();
        let project_id = ProjectId::new();
        let (run, _) = store.create_run(params(project_id)).await.unwrap();
        store.claim_run_for_execution(run.id).await.unwrap();
        store
            .update_run_status(run.id, RunStatus::Running)
            .await
            .unwrap();

        let meta = CompletionMeta {
            usage: Some(Usage::new(10, 5)),
            duration_ms: Some(100),
            ..CompletionMeta::default()
        };
        store.complete_run(run.id, "ok", meta).await.unwrap();

        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.output.as_deref(), Some("ok"));
        assert_eq!(run.usage.unwrap().total_tokens, 15);
        assert!(run.completed_at.is_some());

        let messages = store.list_messages(project_id, run.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "ok");
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();

        let (status, cancelled) = store.cancel_run(run.id).await.unwrap().unwrap();
        assert_eq!(status, RunStatus::Cancelled);
        assert!(cancelled);

        let (status, cancelled) = store.cancel_run(run.id).await.unwrap().unwrap();
        assert_eq!(status, RunStatus::Cancelled);
        assert!(!cancelled);
    }

    #[tokio::test]
    async fn cancel_leaves_completed_runs_alone() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        store.claim_run_for_execution(run.id).await.unwrap();
        store
            .update_run_status(run.id, RunStatus::Running)
            .await
            .unwrap();
        store
            .complete_run(run.id, "done", CompletionMeta::default())
            .await
            .unwrap();

        let (status, cancelled) = store.cancel_run(run.id).await.unwrap().unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert!(!cancelled);
    }

    #[tokio::test]
    async fn mark_job_failed_backs_off_until_budget_exhausted() {
        let store = store();
        let (run, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        store.claim_run_for_execution(run.id).await.unwrap();

        let delay = retry_delay_seconds(1, 30);
        store.mark_job_failed(run.id, 1, delay).await.unwrap();
        let job = store.get_job(run.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 1);
        assert!(job.next_run_at > Utc::now());

        store.mark_job_failed(run.id, 3, 8).await.unwrap();
        let job = store.get_job(run.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn requeue_stale_running_jobs_flips_only_old_claims() {
        let store = store();
        let (stale, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        let (fresh, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        store.claim_run_for_execution(stale.id).await.unwrap();
        store.claim_run_for_execution(fresh.id).await.unwrap();
        store.backdate_job(stale.id, 600);

        let requeued = store.requeue_stale_running_jobs(300).await.unwrap();
        assert_eq!(requeued, vec![stale.id]);

        let job = store.get_job(stale.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        let job = store.get_job(fresh.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn runnable_listing_respects_backoff_and_age() {
        let store = store();
        let (ready, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        let (backing_off, _) = store.create_run(params(ProjectId::new())).await.unwrap();
        let (too_young, _) = store.create_run(params(ProjectId::new())).await.unwrap();

        store.backdate_job(ready.id, 120);
        store.claim_run_for_execution(backing_off.id).await.unwrap();
        store.mark_job_failed(backing_off.id, 1, 3600).await.unwrap();
        store.backdate_job(backing_off.id, 120);
        let _ = too_young;

        let ids = store.list_runnable_queued_job_run_ids(10, 30).await.unwrap();
        assert_eq!(ids, vec![ready.id]);
    }

    #[tokio::test]
    async fn latest_writable_run_skips_failed_and_cancelled() {
        let store = store();
        let project_id = ProjectId::new();

        let (first, _) = store.create_run(params(project_id)).await.unwrap();
        let (second, _) = store.create_run(params(project_id)).await.unwrap();
        let (third, _) = store.create_run(params(project_id)).await.unwrap();

        store.claim_run_for_execution(third.id).await.unwrap();
        store
            .update_run_status(third.id, RunStatus::Running)
            .await
            .unwrap();
        store.fail_run(third.id, "boom").await.unwrap();
        store.cancel_run(second.id).await.unwrap();

        let latest = store.latest_writable_run(project_id).await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
    }

    #[tokio::test]
    async fn pricing_lookup() {
        let store = store();
        store.insert_pricing(ModelPricing {
            provider: "anthropic".to_string(),
            model: "fast".to_string(),
            version: "2026-01".to_string(),
            input_usd_per_mtok: 3.0,
            output_usd_per_mtok: 15.0,
            cached_input_usd_per_mtok: 0.3,
        });

        assert!(store
            .model_pricing("anthropic", "fast")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .model_pricing("anthropic", "slow")
            .await
            .unwrap()
            .is_none());
    }
}
