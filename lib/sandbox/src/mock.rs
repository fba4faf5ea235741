//! Deterministic in-memory sandbox provider for tests.

use crate::error::SandboxError;
use crate::provider::{CommandOptions, CommandOutput, Sandbox, SandboxFile, SandboxProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// An in-memory sandbox with a fixed file tree.
pub struct MockSandbox {
    id: String,
    files: BTreeMap<String, Vec<u8>>,
    closed: AtomicBool,
}

impl MockSandbox {
    /// Creates a sandbox populated with the given absolute-path files.
    #[must_use]
    pub fn with_files(id: impl Into<String>, files: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            files,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates an empty sandbox.
    #[must_use]
    pub fn empty(id: impl Into<String>) -> Self {
        Self::with_files(id, BTreeMap::new())
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<SandboxFile>, SandboxError> {
        if self.is_closed() {
            return Err(SandboxError::Gone {
                sandbox_id: self.id.clone(),
            });
        }
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();

        for (path, data) in &self.files {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child_dir, _)) => {
                    dirs.insert(child_dir.to_string());
                }
                None => entries.push(SandboxFile {
                    path: path.clone(),
                    size: data.len() as u64,
                    is_dir: false,
                }),
            }
        }

        for child in dirs {
            entries.push(SandboxFile {
                path: format!("{prefix}{child}"),
                size: 0,
                is_dir: true,
            });
        }
        Ok(entries)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SandboxError::Api {
                message: format!("file not found: {path}"),
            })
    }

    async fn run_command(
        &self,
        _command: &str,
        _options: CommandOptions,
    ) -> Result<CommandOutput, SandboxError> {
        Ok(CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn close(&self) -> Result<(), SandboxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider handing out [`MockSandbox`] instances.
///
/// Failures can be scripted per call to exercise the retry wrapper.
#[derive(Default)]
pub struct MockSandboxProvider {
    counter: AtomicU64,
    create_failures: Mutex<VecDeque<SandboxError>>,
    template_files: Mutex<BTreeMap<String, Vec<u8>>>,
    sandboxes: Mutex<HashMap<String, Arc<MockSandbox>>>,
}

impl MockSandboxProvider {
    /// Creates a provider whose sandboxes start empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the file tree every created sandbox starts with.
    pub fn seed_files(&self, files: BTreeMap<String, Vec<u8>>) {
        *self.template_files.lock() = files;
    }

    /// Queues errors returned by upcoming `create` calls before one
    /// succeeds.
    pub fn fail_next_creates(&self, errors: Vec<SandboxError>) {
        self.create_failures.lock().extend(errors);
    }

    /// Looks up a sandbox created by this provider.
    #[must_use]
    pub fn sandbox(&self, id: &str) -> Option<Arc<MockSandbox>> {
        self.sandboxes.lock().get(id).cloned()
    }

    /// Number of sandboxes created so far.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxProvider for MockSandboxProvider {
    async fn create(
        &self,
        _template: &str,
        _timeout: Duration,
    ) -> Result<Arc<dyn Sandbox>, SandboxError> {
        if let Some(error) = self.create_failures.lock().pop_front() {
            return Err(error);
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let sandbox = Arc::new(MockSandbox::with_files(
            format!("sbx_{n:04}"),
            self.template_files.lock().clone(),
        ));
        self.sandboxes
            .lock()
            .insert(sandbox.id.clone(), Arc::clone(&sandbox));
        Ok(sandbox)
    }

    async fn connect(&self, id: &str) -> Result<Arc<dyn Sandbox>, SandboxError> {
        self.sandbox(id)
            .map(|s| s as Arc<dyn Sandbox>)
            .ok_or_else(|| SandboxError::Gone {
                sandbox_id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_files_returns_direct_children_only() {
        let mut files = BTreeMap::new();
        files.insert("/app/a.txt".to_string(), b"a".to_vec());
        files.insert("/app/src/main.rs".to_string(), b"m".to_vec());
        files.insert("/app/src/util/mod.rs".to_string(), b"u".to_vec());
        let sandbox = MockSandbox::with_files("sbx", files);

        let entries = sandbox.list_files("/app").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert!(names.contains(&"/app/a.txt"));
        assert!(names.contains(&"/app/src"));
        assert_eq!(entries.len(), 2);

        let src = entries.iter().find(|e| e.path == "/app/src").unwrap();
        assert!(src.is_dir);
    }

    #[tokio::test]
    async fn provider_scripts_create_failures() {
        let provider = MockSandboxProvider::new();
        provider.fail_next_creates(vec![SandboxError::Api {
            message: "503".to_string(),
        }]);

        assert!(
            provider
                .create("base", Duration::from_secs(1))
                .await
                .is_err()
        );
        let sandbox = provider.create("base", Duration::from_secs(1)).await.unwrap();
        assert_eq!(provider.created_count(), 1);
        assert!(provider.sandbox(sandbox.id()).is_some());
    }

    #[tokio::test]
    async fn closed_sandboxes_refuse_listing() {
        let sandbox = MockSandbox::empty("sbx");
        sandbox.close().await.unwrap();
        assert!(sandbox.is_closed());
        assert!(sandbox.list_files("/app").await.is_err());
    }
}
