//! Persisted record shapes (spec §3, §6: "sessions, messages,
//! session_events, workspaces, workspace_agents, plus a schema-version
//! table").

use std::collections::HashMap;
use std::path::PathBuf;

use brokerd_core::{BackendId, SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The schema version this build writes and expects to read.
pub const SCHEMA_VERSION: u32 = 1;

/// Which kind of backend a session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// A spawned child process speaking ACP over stdio.
    Subprocess,
    /// An in-process SDK-driven agent.
    InProcess,
}

/// A session's lifecycle state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Backend is starting; not yet ready for a prompt.
    Initialising,
    /// Ready to accept a prompt.
    Ready,
    /// A prompt is in flight.
    Processing,
    /// Persisted but not live; can be reattached via `connect`.
    Idle,
    /// Shutting down.
    Terminating,
    /// Fully stopped; terminal state.
    Terminated,
}

/// The persisted record for one logical session.
///
/// Authentication material is deliberately absent: spec §3 requires it
/// be "kept only in memory, never logged, never returned".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque client-visible id.
    pub session_id: SessionId,
    /// Backend-assigned id, if one has been reported yet.
    pub backend_id: Option<BackendId>,
    /// Subprocess or in-process.
    pub backend_kind: BackendKind,
    /// The backend-specific configuration in force (spec §10's
    /// enumerated SDK configuration fields, or subprocess launch config).
    pub config_snapshot: Value,
    /// Resolved working directory.
    pub working_directory: PathBuf,
    /// Lifecycle state.
    pub state: SessionState,
    /// When the session was created.
    pub created_at: Timestamp,
    /// Most recent activity, used to drive idle eviction.
    pub last_activity: Timestamp,
}

impl SessionRecord {
    /// Whether this record carries enough information to be rebuilt by
    /// `connect` after a restart (spec §3: "Resumable-session record").
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.backend_id.is_some() && matches!(self.state, SessionState::Idle | SessionState::Ready)
    }
}

/// A workspace: a prepared working directory shared by one or more
/// sessions (direct path or git worktree; preparation itself is an
/// external collaborator, spec §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Workspace id.
    pub workspace_id: String,
    /// Resolved root path.
    pub path: PathBuf,
    /// Arbitrary metadata (e.g. repo URL, branch).
    pub metadata: HashMap<String, String>,
    /// When it was created.
    pub created_at: Timestamp,
}
