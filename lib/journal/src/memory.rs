//! In-memory journal for tests and single-process setups.

use crate::error::JournalError;
use crate::event::{EventRecord, EventType};
use crate::journal::EventJournal;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use runforge_core::RunId;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct JournalState {
    next_id: i64,
    events: HashMap<RunId, Vec<EventRecord>>,
}

/// In-memory [`EventJournal`] implementation.
///
/// The mutex makes appends serializable, so the dense-seq invariant holds
/// without the collision/retry dance the Postgres implementation needs.
#[derive(Clone, Default)]
pub struct InMemoryJournal {
    state: Arc<Mutex<JournalState>>,
}

impl InMemoryJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event for a run, in insertion order.
    #[must_use]
    pub fn events_for(&self, run_id: RunId) -> Vec<EventRecord> {
        self.state
            .lock()
            .events
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the `status` string of each `status` event for a run,
    /// in insertion order. Convenience for scenario assertions.
    #[must_use]
    pub fn status_trail(&self, run_id: RunId) -> Vec<String> {
        self.events_for(run_id)
            .into_iter()
            .filter(|e| e.event_type == EventType::Status)
            .filter_map(|e| {
                e.payload
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(str::to_string)
            })
            .collect()
    }
}

#[async_trait]
impl EventJournal for InMemoryJournal {
    async fn append(
        &self,
        run_id: RunId,
        event_type: EventType,
        payload: JsonValue,
    ) -> Result<(i64, i64), JournalError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        let events = state.events.entry(run_id).or_default();
        let seq = events.len() as i64 + 1;
        events.push(EventRecord {
            id,
            run_id,
            seq,
            event_type,
            payload,
            ts: Utc::now(),
        });
        Ok((id, seq))
    }

    async fn list_after(
        &self,
        run_id: RunId,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, JournalError> {
        Ok(self
            .events_for(run_id)
            .into_iter()
            .filter(|e| e.id > after_id)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list(
        &self,
        run_id: RunId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventRecord>, JournalError> {
        Ok(self
            .events_for(run_id)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_assigns_dense_seq() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        for i in 1..=5 {
            let (_, seq) = journal
                .append(run_id, EventType::Status, json!({"n": i}))
                .await
                .unwrap();
            assert_eq!(seq, i);
        }

        let events = journal.events_for(run_id);
        let seqs: Vec<i64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn seq_is_per_run() {
        let journal = InMemoryJournal::new();
        let run_a = RunId::new();
        let run_b = RunId::new();

        journal
            .append(run_a, EventType::Status, json!({}))
            .await
            .unwrap();
        let (_, seq_b) = journal
            .append(run_b, EventType::Status, json!({}))
            .await
            .unwrap();

        assert_eq!(seq_b, 1);
    }

    #[tokio::test]
    async fn id_order_matches_seq_order() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        for _ in 0..10 {
            journal
                .append(run_id, EventType::Token, json!({"text": "x"}))
                .await
                .unwrap();
        }

        let mut by_id = journal.events_for(run_id);
        by_id.sort_by_key(|e| e.id);
        let mut by_seq = journal.events_for(run_id);
        by_seq.sort_by_key(|e| e.seq);
        assert_eq!(by_id, by_seq);
    }

    #[tokio::test]
    async fn list_after_is_prefix_consistent() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        for i in 0..6 {
            journal
                .append(run_id, EventType::Status, json!({"n": i}))
                .await
                .unwrap();
        }

        let first = journal.list_after(run_id, 0, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        let cursor = first.last().unwrap().id;
        let rest = journal.list_after(run_id, cursor, 100).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.iter().all(|e| e.id > cursor));
    }

    #[tokio::test]
    async fn list_pages_by_offset() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        for i in 0..5 {
            journal
                .append(run_id, EventType::Status, json!({"n": i}))
                .await
                .unwrap();
        }

        let page = journal.list(run_id, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].seq, 3);
        assert_eq!(page[1].seq, 4);
    }

    #[tokio::test]
    async fn concurrent_appends_stay_dense() {
        let journal = InMemoryJournal::new();
        let run_id = RunId::new();

        let mut handles = Vec::new();
        for i in 0..16 {
            let journal = journal.clone();
            handles.push(tokio::spawn(async move {
                journal
                    .append(run_id, EventType::Token, json!({"n": i}))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut seqs: Vec<i64> = journal.events_for(run_id).iter().map(|e| e.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=16).collect::<Vec<i64>>());
    }
}
