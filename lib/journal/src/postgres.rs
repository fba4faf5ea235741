//! Postgres-backed event journal.

use crate::error::JournalError;
use crate::event::{EventRecord, EventType};
use crate::journal::{APPEND_RETRIES, EventJournal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runforge_core::RunId;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

/// Row type for event queries.
#[derive(FromRow)]
struct EventRow {
    id: i64,
    run_id: uuid::Uuid,
    seq: i64,
    r#type: String,
    payload: JsonValue,
    ts: DateTime<Utc>,
}

impl EventRow {
    fn try_into_record(self) -> Result<EventRecord, JournalError> {
        let event_type =
            EventType::from_str_value(&self.r#type).ok_or_else(|| JournalError::Decode {
                message: format!("unknown event type '{}'", self.r#type),
            })?;
        Ok(EventRecord {
            id: self.id,
            run_id: RunId::from_uuid(self.run_id),
            seq: self.seq,
            event_type,
            payload: self.payload,
            ts: self.ts,
        })
    }
}

/// Postgres implementation of [`EventJournal`].
///
/// The dense per-run sequence is assigned with `max(seq)+1` inside the
/// insert; the unique `(run_id, seq)` constraint arbitrates concurrent
/// appenders and the loser retries with a fresh slot.
#[derive(Clone)]
pub struct PgEventJournal {
    pool: PgPool,
}

impl PgEventJournal {
    /// Creates a new journal over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventJournal for PgEventJournal {
    async fn append(
        &self,
        run_id: RunId,
        event_type: EventType,
        payload: JsonValue,
    ) -> Result<(i64, i64), JournalError> {
        for _ in 0..APPEND_RETRIES {
            let result: Result<(i64, i64), sqlx::Error> = sqlx::query_as(
                r#"
                INSERT INTO events (run_id, seq, type, payload)
                SELECT $1, COALESCE(MAX(seq), 0) + 1, $2, $3
                FROM events WHERE run_id = $1
                RETURNING id, seq
                "#,
            )
            .bind(run_id.as_uuid())
            .bind(event_type.as_str())
            .bind(&payload)
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(pair) => return Ok(pair),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => continue,
                Err(e) => {
                    return Err(JournalError::Query {
                        message: e.to_string(),
                    });
                }
            }
        }
        Err(JournalError::SeqContention {
            run_id,
            attempts: APPEND_RETRIES,
        })
    }

    async fn list_after(
        &self,
        run_id: RunId,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, JournalError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, seq, type, payload, ts
            FROM events
            WHERE run_id = $1 AND id > $2
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JournalError::Query {
            message: e.to_string(),
        })?;

        rows.into_iter().map(EventRow::try_into_record).collect()
    }

    async fn list(
        &self,
        run_id: RunId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, JournalError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, seq, type, payload, ts
            FROM events
            WHERE run_id = $1
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JournalError::Query {
            message: e.to_string(),
        })?;

        rows.into_iter().map(EventRow::try_into_record).collect()
    }
}
