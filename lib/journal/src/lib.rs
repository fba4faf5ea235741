//! Append-only per-run event journal for the runforge platform.
//!
//! Every run accumulates a totally ordered sequence of typed events:
//! status transitions, streamed tokens, tool calls, file operations, and
//! exactly one terminal `done` or `error`. The journal assigns each event
//! a globally monotonic `id` and a dense per-run `seq`.

pub mod error;
pub mod event;
pub mod journal;
pub mod memory;
pub mod postgres;

pub use error::JournalError;
pub use event::{EventRecord, EventType};
pub use journal::{APPEND_RETRIES, EventJournal};
pub use memory::InMemoryJournal;
pub use postgres::PgEventJournal;
