//! Create-run / cancel-run / stream-events façade.
//!
//! This is the surface the HTTP layer calls into. Validation happens
//! here; everything past it is the orchestrator's durable machinery.

use runforge_core::{ProjectId, RunId};
use runforge_journal::{EventJournal, EventRecord, EventType, JournalError};
use runforge_queue::{QueueBus, QueueError, RunRequested};
use runforge_store::{
    ArtifactRecord, CreateRunParams, RunRecord, RunStatus, RunStore, StoreError,
    WorkspaceBackend,
};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Errors surfaced to the transport layer.
#[derive(Debug)]
pub enum IngressError {
    /// The request was malformed.
    Validation { message: String },
    /// The run does not exist.
    NotFound { run_id: RunId },
    /// Store operation failed.
    Store(StoreError),
    /// Journal operation failed.
    Journal(JournalError),
    /// Queue operation failed.
    Queue(QueueError),
}

impl fmt::Display for IngressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => write!(f, "invalid request: {message}"),
            Self::NotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::Journal(e) => write!(f, "journal error: {e}"),
            Self::Queue(e) => write!(f, "queue error: {e}"),
        }
    }
}

impl std::error::Error for IngressError {}

impl From<StoreError> for IngressError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<JournalError> for IngressError {
    fn from(e: JournalError) -> Self {
        Self::Journal(e)
    }
}

impl From<QueueError> for IngressError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

/// Input for creating a run.
#[derive(Debug, Clone)]
pub struct CreateRunInput {
    /// Project the run belongs to.
    pub project_id: ProjectId,
    /// The natural-language prompt.
    pub prompt: String,
    /// Opaque structured input.
    pub input: Option<JsonValue>,
    /// Requested model provider.
    pub provider: Option<String>,
    /// Requested model.
    pub model: Option<String>,
    /// Workspace backend override.
    pub workspace_backend: Option<WorkspaceBackend>,
    /// Idempotency key (scoped to the project).
    pub idempotency_key: Option<String>,
    /// Run this one continues.
    pub parent_run_id: Option<RunId>,
    /// Attempt budget override.
    pub max_attempts: Option<i32>,
}

/// Result of a create-run call.
#[derive(Debug, Clone)]
pub struct CreateRunResponse {
    /// The run (fresh or replayed).
    pub run: RunRecord,
    /// Whether this call created it.
    pub created: bool,
}

/// Result of a cancel-run call.
#[derive(Debug, Clone, Copy)]
pub struct CancelRunResponse {
    /// The run's status after the call.
    pub status: RunStatus,
    /// Whether this call performed the cancellation.
    pub cancelled: bool,
}

/// The façade over store, journal, and bus.
pub struct Ingress {
    store: Arc<dyn RunStore>,
    journal: Arc<dyn EventJournal>,
    bus: Arc<dyn QueueBus>,
    default_backend: WorkspaceBackend,
    default_max_attempts: i32,
    stream_poll_interval: Duration,
}

impl Ingress {
    /// Creates the façade.
    #[must_use]
    pub fn new(
        store: Arc<dyn RunStore>,
        journal: Arc<dyn EventJournal>,
        bus: Arc<dyn QueueBus>,
        default_backend: WorkspaceBackend,
        default_max_attempts: i32,
    ) -> Self {
        Self {
            store,
            journal,
            bus,
            default_backend,
            default_max_attempts,
            stream_poll_interval: Duration::from_millis(250),
        }
    }

    /// Overrides the live-stream poll period (tests use a short one).
    #[must_use]
    pub fn with_stream_poll_interval(mut self, interval: Duration) -> Self {
        self.stream_poll_interval = interval;
        self
    }

    /// Creates a run (idempotent by project + idempotency key) and
    /// publishes it to the worker pool.
    pub async fn create_run(
        &self,
        input: CreateRunInput,
    ) -> Result<CreateRunResponse, IngressError> {
        if input.prompt.trim().is_empty() {
            return Err(IngressError::Validation {
                message: "prompt must not be empty".to_string(),
            });
        }
        let max_attempts = input.max_attempts.unwrap_or(self.default_max_attempts);
        if max_attempts < 1 {
            return Err(IngressError::Validation {
                message: "max_attempts must be at least 1".to_string(),
            });
        }
        // the config cap bounds client-requested budgets
        let max_attempts = max_attempts.min(self.default_max_attempts);

        let (run, created) = self
            .store
            .create_run(CreateRunParams {
                project_id: input.project_id,
                prompt: input.prompt,
                input: input.input,
                provider: input.provider,
                model: input.model,
                workspace_backend: input.workspace_backend.unwrap_or(self.default_backend),
                idempotency_key: input.idempotency_key,
                parent_run_id: input.parent_run_id,
                max_attempts,
            })
            .await?;

        if created {
            self.bus.publish(RunRequested { run_id: run.id }).await?;
            tracing::info!(run_id = %run.id, project_id = %run.project_id, "run created");
        }

        Ok(CreateRunResponse { run, created })
    }

    /// Cancels a run. Idempotent; completed and failed runs are left
    /// untouched and reported as such.
    pub async fn cancel_run(&self, run_id: RunId) -> Result<CancelRunResponse, IngressError> {
        let Some((status, cancelled)) = self.store.cancel_run(run_id).await? else {
            return Err(IngressError::NotFound { run_id });
        };

        if cancelled {
            self.store.mark_job_cancelled(run_id).await?;
            self.journal
                .append(run_id, EventType::Status, json!({"status": "cancelled"}))
                .await?;
            tracing::info!(run_id = %run_id, "run cancelled");
        }

        Ok(CancelRunResponse { status, cancelled })
    }

    /// Fetches a run.
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, IngressError> {
        Ok(self.store.get_run(run_id).await?)
    }

    /// Lists events with `id > after_id`.
    pub async fn list_events_after(
        &self,
        run_id: RunId,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, IngressError> {
        Ok(self.journal.list_after(run_id, after_id, limit).await?)
    }

    /// Lists a run's artifacts.
    pub async fn list_artifacts(
        &self,
        run_id: RunId,
    ) -> Result<Vec<ArtifactRecord>, IngressError> {
        Ok(self.store.list_artifacts(run_id).await?)
    }

    /// Streams events: replay everything past the resume cursor, then
    /// follow live appends, closing once the run is terminal and its
    /// journal is drained.
    #[must_use]
    pub fn stream_events(&self, run_id: RunId, resume_after: i64) -> ReceiverStream<EventRecord> {
        let journal = Arc::clone(&self.journal);
        let store = Arc::clone(&self.store);
        let poll = self.stream_poll_interval;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut cursor = resume_after;
            let mut terminal_status_seen = false;
            loop {
                let batch = match journal.list_after(run_id, cursor, 256).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(run_id = %run_id, error = %e, "event stream read failed");
                        break;
                    }
                };

                let mut terminal_event_seen = false;
                for event in batch {
                    cursor = event.id;
                    terminal_event_seen |= event.event_type.is_terminal();
                    if tx.send(event).await.is_err() {
                        return; // consumer went away
                    }
                }
                if terminal_event_seen {
                    break;
                }

                // Cancelled runs end with a status event, not done/error:
                // close after one final drain past the terminal status.
                if terminal_status_seen {
                    break;
                }
                match store.get_run(run_id).await {
                    Ok(Some(run)) if run.status.is_terminal() => {
                        terminal_status_seen = true;
                        continue;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(run_id = %run_id, error = %e, "event stream status check failed");
                    }
                }
                tokio::time::sleep(poll).await;
            }
        });

        ReceiverStream::new(rx)
    }
}
