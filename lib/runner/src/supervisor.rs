//! The run supervisor: claim, execute, retry, finish.
//!
//! One `process` call handles one `RunRequested` delivery. The claim
//! compare-and-set in the store guarantees at most one worker ever holds
//! a run, so duplicate and stale deliveries fall out of the loop
//! harmlessly. Each attempt owns a cancellation watcher and (for
//! sandbox-backed runs) a sandbox supervisor; the attempt finalizer
//! tears both down before the loop continues or exits.

use crate::config::WorkerConfig;
use crate::error::RunnerError;
use crate::hook::{NoopPostCommitHook, PostCommitHook};
use crate::watcher::CancellationWatcher;
use runforge_agent::{AgentDriver, AgentError, AgentRequest, AgentRunResult};
use runforge_core::RunId;
use runforge_journal::{EventJournal, EventType};
use runforge_queue::ArtifactStore;
use runforge_sandbox::{SandboxConfig, SandboxProvider, SandboxSupervisor};
use runforge_store::{
    CompletionMeta, RunRecord, RunStatus, RunStore, WorkspaceBackend, estimate_cost_usd,
    retry_delay_seconds,
};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum AttemptOutcome {
    Succeeded(AgentRunResult),
    Cancelled,
    Failed(String),
}

/// Processes `RunRequested` deliveries for the worker pool.
pub struct RunSupervisor {
    store: Arc<dyn RunStore>,
    journal: Arc<dyn EventJournal>,
    driver: AgentDriver,
    artifacts: Arc<dyn ArtifactStore>,
    sandbox_provider: Option<Arc<dyn SandboxProvider>>,
    sandbox_config: SandboxConfig,
    post_commit: Arc<dyn PostCommitHook>,
    config: WorkerConfig,
}

impl RunSupervisor {
    /// Creates a supervisor with no sandbox provider (host-only) and the
    /// skipping post-commit hook.
    #[must_use]
    pub fn new(
        store: Arc<dyn RunStore>,
        journal: Arc<dyn EventJournal>,
        driver: AgentDriver,
        artifacts: Arc<dyn ArtifactStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            journal,
            driver,
            artifacts,
            sandbox_provider: None,
            sandbox_config: SandboxConfig::default(),
            post_commit: Arc::new(NoopPostCommitHook),
            config,
        }
    }

    /// Enables sandbox-backed attempts.
    #[must_use]
    pub fn with_sandbox(
        mut self,
        provider: Arc<dyn SandboxProvider>,
        config: SandboxConfig,
    ) -> Self {
        self.sandbox_provider = Some(provider);
        self.sandbox_config = config;
        self
    }

    /// Replaces the host post-commit hook.
    #[must_use]
    pub fn with_post_commit(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.post_commit = hook;
        self
    }

    /// Handles one delivery for `run_id`, driving the run until it either
    /// reaches a terminal state, loses the claim to another worker, or
    /// exhausts the attempt budget for this delivery.
    pub async fn process(&self, run_id: RunId) -> Result<(), RunnerError> {
        let Some(run) = self.store.get_run(run_id).await? else {
            tracing::debug!(run_id = %run_id, "run not found, dropping delivery");
            return Ok(());
        };
        if run.status.is_terminal() {
            if run.status == RunStatus::Cancelled {
                self.store.mark_job_cancelled(run_id).await?;
            }
            return Ok(());
        }
        let Some(job) = self.store.get_job(run_id).await? else {
            tracing::warn!(run_id = %run_id, "run has no job row, dropping delivery");
            return Ok(());
        };

        let max_attempts = run.max_attempts;
        let mut attempts = job.attempts;
        let mut backend = run.workspace_backend;

        while attempts < max_attempts {
            if !self.store.claim_run_for_execution(run_id).await? {
                return Ok(());
            }
            let attempt = attempts + 1;

            let effective = self.resolve_backend(backend);
            if effective != backend {
                tracing::warn!(
                    run_id = %run_id,
                    requested = backend.as_str(),
                    effective = effective.as_str(),
                    "workspace backend downgraded"
                );
                self.store
                    .set_run_workspace_backend(run_id, effective)
                    .await?;
                backend = effective;
            }

            self.store
                .set_run_execution_attempt(run_id, attempt, max_attempts)
                .await?;
            self.store
                .update_run_status(run_id, RunStatus::Running)
                .await?;
            self.journal
                .append(
                    run_id,
                    EventType::Status,
                    json!({"status": "running", "attempt": attempt}),
                )
                .await?;
            tracing::info!(run_id = %run_id, attempt, max_attempts, "attempt started");

            let cancel = CancellationToken::new();
            let watcher = CancellationWatcher::spawn(
                Arc::clone(&self.store),
                run_id,
                self.config.cancel_poll_interval,
                cancel.clone(),
            );

            let (sandbox, attempt_result) = self.run_attempt(&run, backend, &cancel).await;
            watcher.abort();

            match self.classify(run_id, attempt_result, &cancel).await? {
                AttemptOutcome::Succeeded(result) => {
                    self.finish_success(run_id, backend, result, sandbox).await?;
                    return Ok(());
                }
                AttemptOutcome::Cancelled => {
                    tracing::info!(run_id = %run_id, attempt, "attempt cancelled");
                    self.store.mark_job_cancelled(run_id).await?;
                    if let Some(sup) = sandbox {
                        sup.finish(false, true, &self.store, &self.journal, &self.artifacts)
                            .await;
                    }
                    return Ok(());
                }
                AttemptOutcome::Failed(message) => {
                    attempts = attempt;
                    let exhausted = attempts >= max_attempts;
                    tracing::warn!(
                        run_id = %run_id,
                        attempt,
                        max_attempts,
                        exhausted,
                        error = %message,
                        "attempt failed"
                    );

                    if exhausted {
                        if let Some(sup) = sandbox {
                            sup.finish(true, false, &self.store, &self.journal, &self.artifacts)
                                .await;
                        }
                        self.store.fail_run(run_id, &message).await?;
                        self.append_post_terminal(
                            run_id,
                            EventType::Error,
                            json!({
                                "error": message,
                                "attempts": attempts,
                                "maxAttempts": max_attempts,
                            }),
                        )
                        .await;
                        self.store
                            .mark_job_failed(run_id, attempts, 0)
                            .await?;
                        return Ok(());
                    }

                    let delay = retry_delay_seconds(attempts, self.config.max_backoff_seconds);
                    self.store.queue_run_for_retry(run_id).await?;
                    self.store.mark_job_failed(run_id, attempts, delay).await?;
                    self.journal
                        .append(
                            run_id,
                            EventType::Status,
                            json!({
                                "status": "attempt_failed",
                                "attempts": attempts,
                                "maxAttempts": max_attempts,
                                "error": message,
                            }),
                        )
                        .await?;
                    self.journal
                        .append(
                            run_id,
                            EventType::Status,
                            json!({
                                "status": "retrying",
                                "nextAttempt": attempts + 1,
                                "backoffSeconds": delay,
                            }),
                        )
                        .await?;
                    if let Some(sup) = sandbox {
                        sup.finish(false, false, &self.store, &self.journal, &self.artifacts)
                            .await;
                    }
                    tokio::time::sleep(Duration::from_secs(delay.max(0) as u64)).await;
                }
            }
        }
        Ok(())
    }

    fn resolve_backend(&self, requested: WorkspaceBackend) -> WorkspaceBackend {
        match requested {
            WorkspaceBackend::E2b if self.sandbox_provider.is_some() => WorkspaceBackend::E2b,
            WorkspaceBackend::E2b | WorkspaceBackend::Host => WorkspaceBackend::Host,
        }
    }

    async fn run_attempt(
        &self,
        run: &RunRecord,
        backend: WorkspaceBackend,
        cancel: &CancellationToken,
    ) -> (Option<SandboxSupervisor>, Result<AgentRunResult, AgentError>) {
        let mut sandbox = None;
        if backend == WorkspaceBackend::E2b {
            let Some(provider) = &self.sandbox_provider else {
                return (
                    None,
                    Err(AgentError::Failed {
                        message: "sandbox backend requested but no provider configured"
                            .to_string(),
                    }),
                );
            };
            match SandboxSupervisor::provision(
                provider,
                self.sandbox_config.clone(),
                run.id,
                &self.store,
                &self.journal,
            )
            .await
            {
                Ok(sup) => sandbox = Some(sup),
                Err(e) => {
                    return (
                        None,
                        Err(AgentError::Failed {
                            message: e.to_string(),
                        }),
                    );
                }
            }
        }

        // For sandbox-backed runs, watch status payloads for sandbox id
        // changes the agent reports and reconcile the persisted id.
        let (tap, reconcile) = if sandbox.is_some() {
            let (tap_tx, mut tap_rx) = mpsc::unbounded_channel::<JsonValue>();
            let store = Arc::clone(&self.store);
            let run_id = run.id;
            let task = tokio::spawn(async move {
                while let Some(payload) = tap_rx.recv().await {
                    if let Some(sandbox_id) = payload.get("sandboxId").and_then(JsonValue::as_str)
                        && let Err(e) = store.set_run_sandbox_id(run_id, Some(sandbox_id)).await
                    {
                        tracing::warn!(run_id = %run_id, error = %e, "sandbox id reconcile failed");
                    }
                }
            });
            (Some(tap_tx), Some(task))
        } else {
            (None, None)
        };

        let request = AgentRequest {
            run_id: run.id,
            prompt: run.prompt.clone(),
            input: run.input.clone(),
            provider: run.provider.clone(),
            model: run.model.clone(),
            workspace_backend: backend.as_str().to_string(),
        };
        let result = self
            .driver
            .run(request, cancel.clone(), Arc::clone(&self.journal), tap)
            .await;

        if let Some(task) = reconcile {
            task.await.ok();
        }
        (sandbox, result)
    }

    async fn classify(
        &self,
        run_id: RunId,
        result: Result<AgentRunResult, AgentError>,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, RunnerError> {
        match result {
            Ok(outcome) => {
                if cancel.is_cancelled() {
                    Ok(AttemptOutcome::Cancelled)
                } else {
                    Ok(AttemptOutcome::Succeeded(outcome))
                }
            }
            Err(e) if e.is_aborted() => Ok(AttemptOutcome::Cancelled),
            Err(e) => {
                let cancelled = self
                    .store
                    .get_run(run_id)
                    .await?
                    .is_some_and(|r| r.status == RunStatus::Cancelled);
                if cancelled {
                    return Ok(AttemptOutcome::Cancelled);
                }
                let message = match e {
                    AgentError::Failed { message } => message,
                    other => other.to_string(),
                };
                Ok(AttemptOutcome::Failed(message))
            }
        }
    }

    async fn finish_success(
        &self,
        run_id: RunId,
        backend: WorkspaceBackend,
        result: AgentRunResult,
        sandbox: Option<SandboxSupervisor>,
    ) -> Result<(), RunnerError> {
        let meta = self.completion_meta(&result).await;
        let estimated_cost_usd = meta.estimated_cost_usd;
        if let Err(e) = self.store.complete_run(run_id, &result.output, meta).await {
            // a cancel can land between the attempt finishing and this
            // write; the cancelled status wins and no terminal event is
            // recorded
            let cancelled = self
                .store
                .get_run(run_id)
                .await?
                .is_some_and(|r| r.status == RunStatus::Cancelled);
            if cancelled {
                self.store.mark_job_cancelled(run_id).await?;
                if let Some(sup) = sandbox {
                    sup.finish(false, true, &self.store, &self.journal, &self.artifacts)
                        .await;
                }
                return Ok(());
            }
            return Err(e.into());
        }

        let mut done = json!({
            "output": result.output,
            "provider": result.provider,
            "model": result.model,
        });
        if let Some(usage) = result.usage
            && let Ok(value) = serde_json::to_value(usage)
        {
            done["usage"] = value;
        }
        if let Some(duration_ms) = result.duration_ms {
            done["durationMs"] = json!(duration_ms);
        }
        if let Some(cost) = estimated_cost_usd {
            done["estimatedCostUsd"] = json!(cost);
        }
        self.append_post_terminal(run_id, EventType::Done, done).await;
        self.store.mark_job_succeeded(run_id).await?;
        tracing::info!(run_id = %run_id, "run completed");

        if backend == WorkspaceBackend::Host {
            let outcome = self.post_commit.commit(run_id).await;
            let mut payload = json!({"status": outcome.status()});
            if let Some(sha) = &outcome.commit_sha {
                payload["commitSha"] = json!(sha);
            }
            if let Some(error) = &outcome.error {
                payload["error"] = json!(error);
            }
            self.append_post_terminal(run_id, EventType::Status, payload)
                .await;
        }

        if let Some(sup) = sandbox {
            sup.finish(true, false, &self.store, &self.journal, &self.artifacts)
                .await;
        }
        Ok(())
    }

    async fn completion_meta(&self, result: &AgentRunResult) -> CompletionMeta {
        let mut meta = CompletionMeta {
            provider: Some(result.provider.clone()),
            model: Some(result.model.clone()),
            usage: result.usage,
            duration_ms: result.duration_ms,
            estimated_cost_usd: None,
            pricing_version: None,
        };
        if let Some(usage) = &result.usage {
            match self
                .store
                .model_pricing(&result.provider, &result.model)
                .await
            {
                Ok(Some(pricing)) => {
                    meta.estimated_cost_usd = Some(estimate_cost_usd(usage, &pricing));
                    meta.pricing_version = Some(pricing.version);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "pricing lookup failed");
                }
            }
        }
        meta
    }

    /// Journal writes after a run is terminal are logged, never raised.
    async fn append_post_terminal(
        &self,
        run_id: RunId,
        event_type: EventType,
        payload: JsonValue,
    ) {
        if let Err(e) = self.journal.append(run_id, event_type, payload).await {
            tracing::warn!(run_id = %run_id, error = %e, "post-terminal journal write failed");
        }
    }
}
