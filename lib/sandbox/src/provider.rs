//! Sandbox provider contract.
//!
//! The remote sandbox SDK lives behind these traits so the orchestrator
//! can be exercised with a deterministic in-memory provider.

use crate::error::SandboxError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A file or directory entry inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxFile {
    /// Absolute path inside the sandbox.
    pub path: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Options for running a command inside a sandbox.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<String>,
    /// Environment variables.
    pub envs: HashMap<String, String>,
    /// Command timeout.
    pub timeout: Option<Duration>,
}

/// Output of a sandbox command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// A live remote sandbox owned by one attempt.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// The provider-assigned sandbox identifier.
    fn id(&self) -> &str;

    /// Lists entries directly under a directory.
    async fn list_files(&self, dir: &str) -> Result<Vec<SandboxFile>, SandboxError>;

    /// Reads a file's contents.
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SandboxError>;

    /// Runs a command.
    async fn run_command(
        &self,
        command: &str,
        options: CommandOptions,
    ) -> Result<CommandOutput, SandboxError>;

    /// Closes the sandbox, releasing the remote resources.
    async fn close(&self) -> Result<(), SandboxError>;
}

/// Provisions and reconnects sandboxes.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Creates a sandbox from a template with a lifetime timeout.
    async fn create(
        &self,
        template: &str,
        timeout: Duration,
    ) -> Result<std::sync::Arc<dyn Sandbox>, SandboxError>;

    /// Connects to an existing sandbox by id.
    async fn connect(&self, id: &str) -> Result<std::sync::Arc<dyn Sandbox>, SandboxError>;
}
