//! Postgres-backed run store.

use crate::artifact::ArtifactRecord;
use crate::error::StoreError;
use crate::job::{JobRecord, JobStatus};
use crate::message::{MessageRecord, MessageRole};
use crate::pricing::ModelPricing;
use crate::run::{CompletionMeta, CreateRunParams, RunRecord, RunStatus, WorkspaceBackend};
use crate::store::RunStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runforge_core::{ArtifactId, MessageId, ProjectId, RunId, Usage};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// How many times `create_run` retries the per-project `run_index` slot
/// before giving up.
const CREATE_RETRIES: u32 = 5;

const RUN_COLUMNS: &str = r#"
    id, project_id, parent_run_id, run_index, idempotency_key, prompt, input,
    provider, model, workspace_backend, status, attempt, max_attempts,
    sandbox_id, output, error, usage, duration_ms, cost_currency,
    estimated_cost_usd, pricing_version, created_at, started_at,
    completed_at, updated_at
"#;

/// Row type for run queries.
#[derive(FromRow)]
struct RunRow {
    id: Uuid,
    project_id: Uuid,
    parent_run_id: Option<Uuid>,
    run_index: i64,
    idempotency_key: Option<String>,
    prompt: String,
    input: Option<JsonValue>,
    provider: Option<String>,
    model: Option<String>,
    workspace_backend: String,
    status: String,
    attempt: i32,
    max_attempts: i32,
    sandbox_id: Option<String>,
    output: Option<String>,
    error: Option<String>,
    usage: Option<JsonValue>,
    duration_ms: Option<i64>,
    cost_currency: String,
    estimated_cost_usd: Option<f64>,
    pricing_version: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl RunRow {
    fn try_into_record(self) -> Result<RunRecord, StoreError> {
        let usage = self
            .usage
            .map(serde_json::from_value::<Usage>)
            .transpose()
            .map_err(|e| StoreError::Decode {
                message: format!("invalid usage for run {}: {e}", self.id),
            })?;
        Ok(RunRecord {
            id: RunId::from_uuid(self.id),
            project_id: ProjectId::from_uuid(self.project_id),
            parent_run_id: self.parent_run_id.map(RunId::from_uuid),
            run_index: self.run_index,
            idempotency_key: self.idempotency_key,
            prompt: self.prompt,
            input: self.input,
            provider: self.provider,
            model: self.model,
            workspace_backend: WorkspaceBackend::from_str_value(&self.workspace_backend),
            status: RunStatus::from_str_value(&self.status),
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            sandbox_id: self.sandbox_id,
            output: self.output,
            error: self.error,
            usage,
            duration_ms: self.duration_ms,
            cost_currency: self.cost_currency,
            estimated_cost_usd: self.estimated_cost_usd,
            pricing_version: self.pricing_version,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row type for job queries.
#[derive(FromRow)]
struct JobRow {
    run_id: Uuid,
    status: String,
    attempts: i32,
    max_attempts: i32,
    next_run_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_record(self) -> JobRecord {
        JobRecord {
            run_id: RunId::from_uuid(self.run_id),
            status: JobStatus::from_str_value(&self.status),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            next_run_at: self.next_run_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row type for artifact queries.
#[derive(FromRow)]
struct ArtifactRow {
    id: Uuid,
    run_id: Uuid,
    name: String,
    path: String,
    mime: String,
    size: i64,
    created_at: DateTime<Utc>,
}

impl ArtifactRow {
    fn into_record(self) -> ArtifactRecord {
        ArtifactRecord {
            id: ArtifactId::from_uuid(self.id),
            run_id: RunId::from_uuid(self.run_id),
            name: self.name,
            path: self.path,
            mime: self.mime,
            size: self.size,
            created_at: self.created_at,
        }
    }
}

/// Row type for message queries.
#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    project_id: Uuid,
    run_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_record(self) -> MessageRecord {
        MessageRecord {
            id: MessageId::from_uuid(self.id),
            project_id: ProjectId::from_uuid(self.project_id),
            run_id: RunId::from_uuid(self.run_id),
            role: MessageRole::from_str_value(&self.role),
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Row type for pricing queries.
#[derive(FromRow)]
struct PricingRow {
    provider: String,
    model: String,
    version: String,
    input_usd_per_mtok: f64,
    output_usd_per_mtok: f64,
    cached_input_usd_per_mtok: f64,
}

impl PricingRow {
    fn into_record(self) -> ModelPricing {
        ModelPricing {
            provider: self.provider,
            model: self.model,
            version: self.version,
            input_usd_per_mtok: self.input_usd_per_mtok,
            output_usd_per_mtok: self.output_usd_per_mtok,
            cached_input_usd_per_mtok: self.cached_input_usd_per_mtok,
        }
    }
}

/// Postgres implementation of [`RunStore`].
///
/// Transitions are enforced in SQL with conditional single-row updates
/// (`WHERE status = ...`), so racing workers cannot observe an invalid
/// state no matter how their statements interleave.
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    /// Creates a new store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_live_by_key(
        &self,
        project_id: ProjectId,
        key: &str,
    ) -> Result<Option<RunRecord>, StoreError> {
        let row: Option<RunRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM runs
            WHERE project_id = $1 AND idempotency_key = $2 AND status <> 'error'
            ORDER BY run_index DESC
            LIMIT 1
            "#
        ))
        .bind(project_id.as_uuid())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RunRow::try_into_record).transpose()
    }

    async fn try_insert_run(
        &self,
        params: &CreateRunParams,
    ) -> Result<Result<RunRecord, sqlx::Error>, StoreError> {
        let run_id = RunId::new();
        let mut tx = self.pool.begin().await?;

        let inserted: Result<RunRow, sqlx::Error> = sqlx::query_as(&format!(
            r#"
            INSERT INTO runs
                (id, project_id, parent_run_id, run_index, idempotency_key,
                 prompt, input, provider, model, workspace_backend,
                 max_attempts)
            SELECT $1, $2, $3, COALESCE(MAX(run_index), 0) + 1, $4,
                   $5, $6, $7, $8, $9,
                   $10
            FROM runs WHERE project_id = $2
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(run_id.as_uuid())
        .bind(params.project_id.as_uuid())
        .bind(params.parent_run_id.map(|id| id.as_uuid()))
        .bind(&params.idempotency_key)
        .bind(&params.prompt)
        .bind(&params.input)
        .bind(&params.provider)
        .bind(&params.model)
        .bind(params.workspace_backend.as_str())
        .bind(params.max_attempts)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                tx.rollback().await.ok();
                return Ok(Err(e));
            }
        };

        sqlx::query(
            r#"
            INSERT INTO jobs (run_id, max_attempts)
            VALUES ($1, $2)
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(params.max_attempts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO events (run_id, seq, type, payload)
            VALUES ($1, 1, 'status', '{"status": "queued"}'::jsonb)
            "#,
        )
        .bind(run_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, project_id, run_id, role, content)
            VALUES ($1, $2, $3, 'user', $4)
            "#,
        )
        .bind(MessageId::new().as_uuid())
        .bind(params.project_id.as_uuid())
        .bind(run_id.as_uuid())
        .bind(&params.prompt)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Ok(row.try_into_record()?))
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(
        &self,
        params: CreateRunParams,
    ) -> Result<(RunRecord, bool), StoreError> {
        for _ in 0..CREATE_RETRIES {
            if let Some(key) = &params.idempotency_key
                && let Some(existing) = self.find_live_by_key(params.project_id, key).await?
            {
                return Ok((existing, false));
            }

            match self.try_insert_run(&params).await? {
                Ok(run) => return Ok((run, true)),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    // Either another creator with the same idempotency key
                    // won, or two inserts raced on run_index. The next
                    // iteration re-checks the key and recomputes the index.
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::IndexContention {
            attempts: CREATE_RETRIES,
        })
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>, StoreError> {
        let row: Option<RunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1"))
                .bind(run_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        row.map(RunRow::try_into_record).transpose()
    }

    async fn get_run_in_project(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Option<RunRecord>, StoreError> {
        let row: Option<RunRow> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE id = $1 AND project_id = $2"
        ))
        .bind(run_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(RunRow::try_into_record).transpose()
    }

    async fn latest_writable_run(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<RunRecord>, StoreError> {
        let row: Option<RunRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM runs
            WHERE project_id = $1 AND status NOT IN ('error', 'cancelled')
            ORDER BY run_index DESC
            LIMIT 1
            "#
        ))
        .bind(project_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(RunRow::try_into_record).transpose()
    }

    async fn claim_run_for_execution(&self, run_id: RunId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running', updated_at = NOW()
            WHERE run_id = $1
              AND status = 'queued'
              AND EXISTS (
                  SELECT 1 FROM runs
                  WHERE id = $1
                    AND status NOT IN ('completed', 'error', 'cancelled')
              )
            "#,
        )
        .bind(run_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_run_execution_attempt(
        &self,
        run_id: RunId,
        attempt: i32,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE runs
            SET attempt = $2, max_attempts = $3,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(attempt)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_run_sandbox_id(
        &self,
        run_id: RunId,
        sandbox_id: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE runs SET sandbox_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(run_id.as_uuid())
            .bind(sandbox_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_run_workspace_backend(
        &self,
        run_id: RunId,
        backend: WorkspaceBackend,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE runs SET workspace_backend = $2, updated_at = NOW() WHERE id = $1")
            .bind(run_id.as_uuid())
            .bind(backend.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
    ) -> Result<(), StoreError> {
        let allowed: &[&str] = match status {
            RunStatus::Running => &["queued"],
            RunStatus::Queued => &["running"],
            RunStatus::Cancelled => &["queued", "running"],
            // success/failure go through complete_run/fail_run so output
            // and timestamps land in the same statement
            RunStatus::Completed | RunStatus::Error => &[],
        };
        let allowed: Vec<String> = allowed.iter().map(|s| (*s).to_string()).collect();

        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2,
                completed_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(status.as_str())
        .bind(&allowed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_run(run_id).await? {
            Some(run) => Err(StoreError::InvalidTransition {
                run_id,
                from: run.status,
                to: status,
            }),
            None => Err(StoreError::RunNotFound { run_id }),
        }
    }

    async fn complete_run(
        &self,
        run_id: RunId,
        output: &str,
        meta: CompletionMeta,
    ) -> Result<(), StoreError> {
        let usage = meta
            .usage
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Decode {
                message: e.to_string(),
            })?;

        let mut tx = self.pool.begin().await?;
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE runs
            SET status = 'completed', output = $2,
                provider = COALESCE($3, provider),
                model = COALESCE($4, model),
                usage = $5, duration_ms = $6,
                estimated_cost_usd = $7, pricing_version = $8,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING project_id
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(output)
        .bind(&meta.provider)
        .bind(&meta.model)
        .bind(&usage)
        .bind(meta.duration_ms)
        .bind(meta.estimated_cost_usd)
        .bind(&meta.pricing_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((project_id,)) = row else {
            tx.rollback().await.ok();
            return match self.get_run(run_id).await? {
                Some(run) => Err(StoreError::InvalidTransition {
                    run_id,
                    from: run.status,
                    to: RunStatus::Completed,
                }),
                None => Err(StoreError::RunNotFound { run_id }),
            };
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, project_id, run_id, role, content)
            VALUES ($1, $2, $3, 'assistant', $4)
            "#,
        )
        .bind(MessageId::new().as_uuid())
        .bind(project_id)
        .bind(run_id.as_uuid())
        .bind(output)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fail_run(&self, run_id: RunId, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = 'error', error = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_run(run_id).await? {
            Some(run) => Err(StoreError::InvalidTransition {
                run_id,
                from: run.status,
                to: RunStatus::Error,
            }),
            None => Err(StoreError::RunNotFound { run_id }),
        }
    }

    async fn cancel_run(
        &self,
        run_id: RunId,
    ) -> Result<Option<(RunStatus, bool)>, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('queued', 'running')
            "#,
        )
        .bind(run_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Some((RunStatus::Cancelled, true)));
        }
        Ok(self.get_run(run_id).await?.map(|run| (run.status, false)))
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
        sqlx::query(
            r#"
            UPDATE jobs
            SET attempts = $2,
                status = CASE WHEN $2 < max_attempts THEN 'queued' ELSE 'failed' END,
                next_run_at = CASE WHEN $2 < max_attempts
                                   THEN NOW() + make_interval(secs => $3)
                                   ELSE next_run_at END,
                updated_at = NOW()
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(attempts)
        .bind(delay_seconds as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_job_succeeded(&self, run_id: RunId) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET status = 'succeeded', updated_at = NOW() WHERE run_id = $1")
            .bind(run_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_job_cancelled(&self, run_id: RunId) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET status = 'cancelled', updated_at = NOW() WHERE run_id = $1")
            .bind(run_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_job(&self, run_id: RunId) -> Result<Option<JobRecord>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT run_id, status, attempts, max_attempts, next_run_at,
                   created_at, updated_at
            FROM jobs
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobRow::into_record))
    }

    async fn requeue_stale_running_jobs(
        &self,
        stale_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'queued', next_run_at = NOW(), updated_at = NOW()
            WHERE status = 'running'
              AND updated_at < NOW() - make_interval(secs => $1)
            RETURNING run_id
            "#,
        )
        .bind(stale_seconds as f64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| RunId::from_uuid(id)).collect())
    }

    async fn list_runnable_queued_job_run_ids(
        &self,
        limit: i64,
        min_queued_age_seconds: i64,
    ) -> Result<Vec<RunId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT run_id
            FROM jobs
            WHERE status = 'queued'
              AND next_run_at <= NOW()
              AND updated_at <= NOW() - make_interval(secs => $2)
            ORDER BY updated_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(min_queued_age_seconds as f64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| RunId::from_uuid(id)).collect())
    }

    async fn record_artifact(&self, artifact: &ArtifactRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (id, run_id, name, path, mime, size, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(artifact.id.as_uuid())
        .bind(artifact.run_id.as_uuid())
        .bind(&artifact.name)
        .bind(&artifact.path)
        .bind(&artifact.mime)
        .bind(artifact.size)
        .bind(artifact.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactRecord>, StoreError> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, name, path, mime, size, created_at
            FROM artifacts
            WHERE run_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ArtifactRow::into_record).collect())
    }

    async fn append_message(&self, message: &MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, project_id, run_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.project_id.as_uuid())
        .bind(message.run_id.as_uuid())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        project_id: ProjectId,
        run_id: RunId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, run_id, role, content, created_at
            FROM messages
            WHERE project_id = $1 AND run_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_id.as_uuid())
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageRow::into_record).collect())
    }

    async fn model_pricing(
        &self,
        provider: &str,
        model: &str,
    ) -> Result<Option<ModelPricing>, StoreError> {
        let row: Option<PricingRow> = sqlx::query_as(
            r#"
            SELECT provider, model, version, input_usd_per_mtok,
                   output_usd_per_mtok, cached_input_usd_per_mtok
            FROM model_pricing
            WHERE provider = $1 AND model = $2
            "#,
        )
        .bind(provider)
        .bind(model)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PricingRow::into_record))
    }
}
