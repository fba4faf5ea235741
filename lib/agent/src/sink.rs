//! Ordered delivery of agent events into the journal.
//!
//! Agent events may be emitted from concurrent subtasks, but the journal
//! must receive them in the order they were delivered. The sink is a
//! mailbox: senders enqueue without awaiting, and a single drain task
//! appends to the journal one event at a time.

use crate::event::AgentEvent;
use runforge_core::RunId;
use runforge_journal::{EventJournal, JournalError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Serializes journal appends for one attempt.
pub struct EventSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
    drain: JoinHandle<Result<(), JournalError>>,
}

impl EventSink {
    /// Spawns the drain task for an attempt.
    #[must_use]
    pub fn spawn(journal: Arc<dyn EventJournal>, run_id: RunId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AgentEvent>();
        let drain = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                journal
                    .append(run_id, event.kind.into(), event.payload)
                    .await?;
            }
            Ok(())
        });
        Self { tx, drain }
    }

    /// Enqueues an event. Returns false if the drain task has stopped.
    pub fn send(&self, event: AgentEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// A sender handle for producers that outlive the borrow.
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<AgentEvent> {
        self.tx.clone()
    }

    /// Closes the mailbox and waits until every enqueued event has been
    /// appended.
    pub async fn flush(self) -> Result<(), JournalError> {
        drop(self.tx);
        match self.drain.await {
            Ok(result) => result,
            Err(e) => Err(JournalError::Query {
                message: format!("event sink task failed: {e}"),
            }),
        }
    }
}
