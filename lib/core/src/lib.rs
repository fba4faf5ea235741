//! Core domain types for the runforge platform.
//!
//! This crate holds the types shared by every other crate in the
//! workspace: strongly-typed IDs, token usage accounting, and the
//! `Result` alias used for layered error context.

pub mod error;
pub mod id;
pub mod usage;

pub use error::Result;
pub use id::{ArtifactId, MessageId, ParseIdError, ProjectId, RunId};
pub use usage::Usage;
