//! Per-request execution workspaces.
//!
//! Each request owns one uniquely named directory under the executions
//! root. Names embed the creation instant in milliseconds, which is also
//! what the pruner sorts on.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

pub const USER_CODE_FILE: &str = "user-code.js";
pub const INPUT_FILE: &str = "input.json";
pub const WRAPPER_FILE: &str = "wrapper.js";
pub const DEBUG_LOG_FILE: &str = "debug.log";

const WORKSPACE_PREFIX: &str = "exec-";

/// A per-request directory holding the user program, its input, the
/// wrapper, and a view of the dependency tree.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn user_code_path(&self) -> PathBuf {
        self.path.join(USER_CODE_FILE)
    }

    pub fn input_path(&self) -> PathBuf {
        self.path.join(INPUT_FILE)
    }

    pub fn wrapper_path(&self) -> PathBuf {
        self.path.join(WRAPPER_FILE)
    }

    pub fn debug_log_path(&self) -> PathBuf {
        self.path.join(DEBUG_LOG_FILE)
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    keep_count: usize,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, keep_count: usize) -> Self {
        Self {
            root: root.into(),
            keep_count,
        }
    }

    /// Whether finished workspaces are retained for inspection rather
    /// than deleted as soon as the response is out.
    pub fn retention_enabled(&self) -> bool {
        self.keep_count > 0
    }

    /// Create a fresh `exec-<millis>-<rand5>` directory. With retention
    /// active, every allocation also prunes the oldest surplus
    /// workspaces.
    pub async fn allocate(&self) -> std::io::Result<Workspace> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{WORKSPACE_PREFIX}{millis}-{}", &suffix[..5]);
        let path = self.root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        debug!(workspace = %path.display(), "Allocated workspace");

        if self.retention_enabled() {
            self.prune().await;
        }

        Ok(Workspace { path })
    }

    /// Delete every workspace older than the newest `keep_count`.
    pub async fn prune(&self) {
        let mut read_dir = match tokio::fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(err) => {
                warn!(root = %self.root.display(), error = %err, "Cannot enumerate workspaces");
                return;
            }
        };

        let mut stamped: Vec<(u128, PathBuf)> = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(WORKSPACE_PREFIX) else {
                continue;
            };
            let Some(millis) = rest
                .split('-')
                .next()
                .and_then(|m| m.parse::<u128>().ok())
            else {
                continue;
            };
            stamped.push((millis, entry.path()));
        }

        if stamped.len() <= self.keep_count {
            return;
        }

        stamped.sort_by_key(|(millis, _)| *millis);
        let surplus = stamped.len() - self.keep_count;
        for (_, path) in stamped.into_iter().take(surplus) {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => debug!(workspace = %path.display(), "Pruned workspace"),
                Err(err) => {
                    warn!(workspace = %path.display(), error = %err, "Failed to prune workspace");
                }
            }
        }
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub async fn remove(&self, workspace: &Workspace) {
        if let Err(err) = tokio::fs::remove_dir_all(workspace.path()).await {
            warn!(workspace = %workspace.path().display(), error = %err, "Failed to remove workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocated_names_carry_millis_and_suffix() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), 0);

        let workspace = manager.allocate().await.unwrap();
        assert!(workspace.path().is_dir());

        let name = workspace
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let mut parts = name.splitn(3, '-');
        assert_eq!(parts.next(), Some("exec"));
        assert!(parts.next().unwrap().parse::<u128>().is_ok());
        assert_eq!(parts.next().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn prune_keeps_only_the_newest() {
        let root = tempfile::tempdir().unwrap();
        for millis in [1000, 2000, 3000, 4000] {
            tokio::fs::create_dir(root.path().join(format!("exec-{millis}-aaaaa")))
                .await
                .unwrap();
        }
        // unrelated directories survive pruning
        tokio::fs::create_dir(root.path().join("keepme")).await.unwrap();

        let manager = WorkspaceManager::new(root.path(), 2);
        manager.prune().await;

        assert!(!root.path().join("exec-1000-aaaaa").exists());
        assert!(!root.path().join("exec-2000-aaaaa").exists());
        assert!(root.path().join("exec-3000-aaaaa").exists());
        assert!(root.path().join("exec-4000-aaaaa").exists());
        assert!(root.path().join("keepme").exists());
    }

    #[tokio::test]
    async fn allocation_under_retention_prunes_surplus() {
        let root = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("exec-1-aaaaa"))
            .await
            .unwrap();
        tokio::fs::create_dir(root.path().join("exec-2-aaaaa"))
            .await
            .unwrap();

        let manager = WorkspaceManager::new(root.path(), 2);
        let workspace = manager.allocate().await.unwrap();

        assert!(workspace.path().is_dir());
        assert!(!root.path().join("exec-1-aaaaa").exists());
        assert!(root.path().join("exec-2-aaaaa").exists());
    }

    #[tokio::test]
    async fn remove_swallows_missing_workspaces() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path(), 0);
        let workspace = manager.allocate().await.unwrap();

        manager.remove(&workspace).await;
        assert!(!workspace.path().exists());
        // removing again must not panic
        manager.remove(&workspace).await;
    }
}
