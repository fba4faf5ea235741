//! Workspace snapshot capture.
//!
//! Walks the sandbox workspace, prunes well-known dense directories,
//! denies sensitive files, enforces file-count and byte budgets, and
//! packs the survivors into a deterministically ordered STORED ZIP.

use crate::error::SnapshotError;
use crate::provider::Sandbox;
use crate::zip::StoredZipWriter;
use std::sync::Arc;

/// Directories never descended into.
const PRUNED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "target",
    ".venv",
    "__pycache__",
    ".cache",
    "coverage",
    ".turbo",
    ".pnpm-store",
    "vendor",
];

/// Budgets for a workspace snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotLimits {
    /// Maximum number of files.
    pub max_files: usize,
    /// Maximum total bytes across all files.
    pub max_bytes: u64,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self {
            max_files: 20_000,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// A captured workspace snapshot, ready for the artifact bucket.
#[derive(Debug, Clone)]
pub struct WorkspaceSnapshot {
    /// The finished ZIP archive.
    pub bytes: Vec<u8>,
    /// Number of files packed.
    pub file_count: usize,
    /// Total uncompressed bytes packed.
    pub total_bytes: u64,
}

/// Returns true for directory names that are never descended into.
#[must_use]
pub fn is_pruned_dir(name: &str) -> bool {
    PRUNED_DIRS.contains(&name)
}

/// Returns true for file names that must never leave the sandbox.
#[must_use]
pub fn is_denied_file(name: &str) -> bool {
    name == ".env"
        || name.starts_with(".env.")
        || name.ends_with(".pem")
        || name.ends_with(".key")
        || name.starts_with("id_rsa")
        || name.ends_with(".p12")
        || name.ends_with(".pfx")
        || name == "credentials.json"
        || name == ".npmrc"
        || name == ".netrc"
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Captures the workspace under `root` into a ZIP archive.
///
/// Entry paths are relative to `root` and sorted byte-wise, so the same
/// workspace always produces the same archive layout.
pub async fn capture_workspace(
    sandbox: &Arc<dyn Sandbox>,
    root: &str,
    limits: &SnapshotLimits,
) -> Result<WorkspaceSnapshot, SnapshotError> {
    let mut pending = vec![root.to_string()];
    let mut files: Vec<(String, u64)> = Vec::new();
    let mut total_bytes: u64 = 0;

    while let Some(dir) = pending.pop() {
        for entry in sandbox.list_files(&dir).await? {
            let name = base_name(&entry.path);
            if entry.is_dir {
                if !is_pruned_dir(name) {
                    pending.push(entry.path);
                }
                continue;
            }
            if is_denied_file(name) {
                continue;
            }
            if files.len() + 1 > limits.max_files {
                return Err(SnapshotError::TooManyFiles {
                    count: files.len() + 1,
                    limit: limits.max_files,
                });
            }
            total_bytes += entry.size;
            if total_bytes > limits.max_bytes {
                return Err(SnapshotError::TooLarge {
                    bytes: total_bytes,
                    limit: limits.max_bytes,
                });
            }
            files.push((entry.path, entry.size));
        }
    }

    files.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

    let prefix = format!("{}/", root.trim_end_matches('/'));
    let mut writer = StoredZipWriter::new();
    for (path, _) in &files {
        let data = sandbox.read_file(path).await?;
        let relative = path.strip_prefix(&prefix).unwrap_or(path);
        writer.add_file(relative, &data);
    }

    Ok(WorkspaceSnapshot {
        bytes: writer.finish(),
        file_count: files.len(),
        total_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSandbox;

    fn sandbox_with(files: &[(&str, &[u8])]) -> Arc<dyn Sandbox> {
        Arc::new(MockSandbox::with_files(
            "sbx_test",
            files
                .iter()
                .map(|(path, data)| ((*path).to_string(), data.to_vec()))
                .collect(),
        ))
    }

    #[test]
    fn prune_and_deny_lists() {
        assert!(is_pruned_dir("node_modules"));
        assert!(is_pruned_dir(".git"));
        assert!(!is_pruned_dir("src"));

        assert!(is_denied_file(".env"));
        assert!(is_denied_file(".env.local"));
        assert!(is_denied_file("server.pem"));
        assert!(is_denied_file("id_rsa.pub"));
        assert!(!is_denied_file("main.rs"));
        assert!(!is_denied_file("environment.md"));
    }

    #[tokio::test]
    async fn capture_packs_files_relative_to_root() {
        let sandbox = sandbox_with(&[
            ("/home/user/app/src/main.rs", b"fn main() {}"),
            ("/home/user/app/README.md", b"# app"),
        ]);

        let snapshot = capture_workspace(&sandbox, "/home/user/app", &SnapshotLimits::default())
            .await
            .unwrap();

        assert_eq!(snapshot.file_count, 2);
        assert!(snapshot.total_bytes > 0);
        // deterministic order: README.md sorts before src/main.rs
        let bytes = snapshot.bytes;
        let readme_pos = bytes
            .windows(9)
            .position(|w| w == b"README.md")
            .expect("README entry");
        let main_pos = bytes
            .windows(11)
            .position(|w| w == b"src/main.rs")
            .expect("main entry");
        assert!(readme_pos < main_pos);
    }

    #[tokio::test]
    async fn capture_prunes_dense_directories() {
        let sandbox = sandbox_with(&[
            ("/app/src/lib.rs", b"pub fn x() {}"),
            ("/app/node_modules/left-pad/index.js", b"padding"),
            ("/app/.git/HEAD", b"ref: refs/heads/main"),
        ]);

        let snapshot = capture_workspace(&sandbox, "/app", &SnapshotLimits::default())
            .await
            .unwrap();

        assert_eq!(snapshot.file_count, 1);
    }

    #[tokio::test]
    async fn capture_denies_sensitive_files() {
        let sandbox = sandbox_with(&[
            ("/app/.env", b"SECRET=1"),
            ("/app/.env.production", b"SECRET=2"),
            ("/app/deploy.key", b"-----BEGIN"),
            ("/app/ok.txt", b"fine"),
        ]);

        let snapshot = capture_workspace(&sandbox, "/app", &SnapshotLimits::default())
            .await
            .unwrap();

        assert_eq!(snapshot.file_count, 1);
        assert!(!snapshot.bytes.windows(4).any(|w| w == b".env"));
    }

    #[tokio::test]
    async fn capture_enforces_file_budget() {
        let sandbox = sandbox_with(&[
            ("/app/a.txt", b"a"),
            ("/app/b.txt", b"b"),
            ("/app/c.txt", b"c"),
        ]);

        let limits = SnapshotLimits {
            max_files: 2,
            max_bytes: 1024,
        };
        let err = capture_workspace(&sandbox, "/app", &limits).await.unwrap_err();
        assert!(matches!(err, SnapshotError::TooManyFiles { limit: 2, .. }));
    }

    #[tokio::test]
    async fn capture_enforces_byte_budget() {
        let sandbox = sandbox_with(&[("/app/big.bin", &[0u8; 64][..])]);

        let limits = SnapshotLimits {
            max_files: 100,
            max_bytes: 16,
        };
        let err = capture_workspace(&sandbox, "/app", &limits).await.unwrap_err();
        assert!(matches!(err, SnapshotError::TooLarge { limit: 16, .. }));
    }
}
