//! The shared `Result` alias for runforge crates.
//!
//! Runforge keeps its domain errors as hand-rolled enums next to the
//! code that raises them (`JournalError`, `StoreError`, `QueueError`,
//! `SandboxError`, `AgentError`) and composes them at the boundaries
//! (`RunnerError`, `IngressError`) instead of funnelling everything
//! through one catch-all type. The rootcause-backed alias below is for
//! the layers above those boundaries, binaries and glue, where a report
//! with layered `.context()` reads better than yet another wrapper enum.

use rootcause::Report;

/// Result type whose error is a rootcause [`Report`].
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
