//! The append-only event journal contract.

use crate::error::JournalError;
use crate::event::{EventRecord, EventType};
use async_trait::async_trait;
use runforge_core::RunId;
use serde_json::Value as JsonValue;

/// How many times an append retries a fresh `max(seq)+1` slot before
/// surfacing contention to the caller.
pub const APPEND_RETRIES: u32 = 5;

/// Append-only, totally ordered journal of events per run.
///
/// Guarantees:
/// - Within a run, `id` order matches insertion order and `seq` is dense
///   (1..N, no gaps, no duplicates).
/// - Readers observe a prefix-consistent view: once an event with id N has
///   been returned for a run, every event with id ≤ N for that run is
///   returned by subsequent calls.
/// - Existing events are never mutated.
#[async_trait]
pub trait EventJournal: Send + Sync {
    /// Appends an event, assigning the next dense `seq` for the run.
    ///
    /// Concurrent appenders race on the sequence slot; the loser retries
    /// with a fresh `max(seq)+1` up to [`APPEND_RETRIES`] times.
    ///
    /// Returns the assigned `(id, seq)` pair.
    async fn append(
        &self,
        run_id: RunId,
        event_type: EventType,
        payload: JsonValue,
    ) -> Result<(i64, i64), JournalError>;

    /// Lists events with `id > after_id`, ordered by `id` ascending.
    async fn list_after(
        &self,
        run_id: RunId,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, JournalError>;

    /// Lists events for back-paging, ordered by `id` ascending.
    async fn list(
        &self,
        run_id: RunId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, JournalError>;
}
