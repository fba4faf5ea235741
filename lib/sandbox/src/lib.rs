//! Remote sandbox management for runforge attempts.
//!
//! This crate provides:
//!
//! - **Provider traits**: the thin contract over the remote sandbox SDK
//! - **Retry**: exponential backoff with a transient-error predicate for
//!   every provider API call
//! - **Snapshot**: workspace capture into a deterministically ordered
//!   STORED-method ZIP with data descriptors
//! - **Supervisor**: one attempt's sandbox lifetime, from provisioning
//!   to the teardown that snapshots, closes, and clears the persisted id
//! - **Mock provider**: a scriptable in-memory provider for tests

pub mod error;
pub mod mock;
pub mod provider;
pub mod retry;
pub mod snapshot;
pub mod supervisor;
pub mod zip;

pub use error::{SandboxError, SnapshotError};
pub use mock::{MockSandbox, MockSandboxProvider};
pub use provider::{CommandOptions, CommandOutput, Sandbox, SandboxFile, SandboxProvider};
pub use retry::{RetryPolicy, is_transient, with_retry};
pub use snapshot::{SnapshotLimits, WorkspaceSnapshot, capture_workspace};
pub use supervisor::{CommandTimeouts, SandboxConfig, SandboxSupervisor};
pub use zip::StoredZipWriter;
