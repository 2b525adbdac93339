//! Working-directory resolution (spec §4.3: "optional `workspaceId` or
//! `repoPath`").
//!
//! The git-worktree manager itself is an external collaborator (spec
//! §1 Non-goals: "the core ... does not sandbox"; preparing a worktree
//! is out of scope for this crate). This module owns only the narrow
//! decision of *which* directory a session should use, delegating
//! worktree preparation through the [`WorktreeManager`] trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{WorkspaceError, WorkspaceResult};

/// How a session-creation request named its working directory.
#[derive(Debug, Clone)]
pub enum WorkingDirectoryRequest {
    /// Use this path directly; no worktree is prepared.
    RepoPath(PathBuf),
    /// Ask the worktree manager to prepare (or reuse) a worktree for this
    /// workspace id.
    WorkspaceId(String),
}

/// The external git-worktree manager (spec §1: out of scope for the
/// core; consumed here only as a named interface).
#[async_trait]
pub trait WorktreeManager: Send + Sync {
    /// Prepare (or reuse) a working directory for `workspace_id`.
    async fn prepare(&self, workspace_id: &str) -> WorkspaceResult<PathBuf>;
}

/// Resolve a session-creation request's working directory.
///
/// # Errors
///
/// [`WorkspaceError::InvalidRepoPath`] if `RepoPath` doesn't name an
/// existing directory; [`WorkspaceError::WorktreePreparationFailed`] if
/// the worktree manager fails.
pub async fn resolve(request: &WorkingDirectoryRequest, manager: &dyn WorktreeManager) -> WorkspaceResult<PathBuf> {
    match request {
        WorkingDirectoryRequest::RepoPath(path) => {
            if is_usable_directory(path) {
                Ok(path.clone())
            } else {
                Err(WorkspaceError::InvalidRepoPath { path: path.display().to_string() })
            }
        }
        WorkingDirectoryRequest::WorkspaceId(workspace_id) => manager.prepare(workspace_id).await,
    }
}

fn is_usable_directory(path: &Path) -> bool {
    path.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeWorktreeManager {
        prepared: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl WorktreeManager for FakeWorktreeManager {
        async fn prepare(&self, workspace_id: &str) -> WorkspaceResult<PathBuf> {
            if self.fail_for.as_deref() == Some(workspace_id) {
                return Err(WorkspaceError::WorktreePreparationFailed {
                    workspace_id: workspace_id.to_string(),
                    reason: "disk full".to_string(),
                });
            }
            self.prepared.lock().unwrap().push(workspace_id.to_string());
            Ok(PathBuf::from(format!("/worktrees/{workspace_id}")))
        }
    }

    #[tokio::test]
    async fn a_repo_path_pointing_at_a_real_directory_resolves_directly() {
        let manager = FakeWorktreeManager { prepared: Mutex::new(Vec::new()), fail_for: None };
        let resolved = resolve(&WorkingDirectoryRequest::RepoPath(std::env::temp_dir()), &manager).await.unwrap();
        assert_eq!(resolved, std::env::temp_dir());
        assert!(manager.prepared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_repo_path_that_does_not_exist_is_rejected() {
        let manager = FakeWorktreeManager { prepared: Mutex::new(Vec::new()), fail_for: None };
        let missing = PathBuf::from("/does/not/exist/xyz");
        let err = resolve(&WorkingDirectoryRequest::RepoPath(missing), &manager).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidRepoPath { .. }));
    }

    #[tokio::test]
    async fn a_workspace_id_delegates_to_the_worktree_manager() {
        let manager = FakeWorktreeManager { prepared: Mutex::new(Vec::new()), fail_for: None };
        let resolved = resolve(&WorkingDirectoryRequest::WorkspaceId("ws1".to_string()), &manager).await.unwrap();
        assert_eq!(resolved, PathBuf::from("/worktrees/ws1"));
        assert_eq!(manager.prepared.lock().unwrap().as_slice(), ["ws1"]);
    }

    #[tokio::test]
    async fn worktree_preparation_failure_propagates() {
        let manager = FakeWorktreeManager { prepared: Mutex::new(Vec::new()), fail_for: Some("ws1".to_string()) };
        let err = resolve(&WorkingDirectoryRequest::WorkspaceId("ws1".to_string()), &manager).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::WorktreePreparationFailed { .. }));
    }
}
