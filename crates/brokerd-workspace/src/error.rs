//! Working-directory resolution errors.

/// Errors from resolving a session's working directory.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Neither `workspaceId` nor `repoPath` was supplied.
    #[error("session-creation request carried neither workspaceId nor repoPath")]
    NoWorkingDirectorySpecified,

    /// The external git-worktree manager failed to prepare a worktree.
    #[error("failed to prepare worktree for workspace {workspace_id}: {reason}")]
    WorktreePreparationFailed {
        /// The workspace id that failed to prepare.
        workspace_id: String,
        /// What the worktree manager reported.
        reason: String,
    },

    /// A direct `repoPath` did not exist or was not a directory.
    #[error("repo path {path} is not a usable directory")]
    InvalidRepoPath {
        /// The offending path.
        path: String,
    },
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
