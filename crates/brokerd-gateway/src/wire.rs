//! HTTP/WS/SSE request and response bodies (spec §6).
//!
//! These are thin, serde-derived DTOs over the typed collaborator
//! requests (`brokerd_session::CreateSessionRequest`, `SdkQueryOptions`,
//! ...) — the handlers in [`crate::server`] do the mapping. Kept
//! separate from those inner types because the wire shape (camelCase
//! JSON, optional fields with defaults) is allowed to evolve
//! independently of the session layer's Rust-side API.

use std::collections::HashMap;
use std::path::PathBuf;

use brokerd_approval::{ApiKeyRef, AuthMode, AuthRequest};
use brokerd_core::SessionId;
use brokerd_sdk::SdkQueryOptions;
use brokerd_session::{BackendLaunch, CreateSessionRequest};
use brokerd_storage::{SessionRecord, SessionState};
use brokerd_workspace::WorkingDirectoryRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /v1/sessions` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionBody {
    /// Auth material for the backend.
    pub auth: AuthRequestBody,
    /// Raw environment overrides (spec §4.8).
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working-directory source.
    #[serde(rename = "workingDirectory")]
    pub working_directory: WorkingDirectoryBody,
    /// Which kind of backend to launch.
    pub launch: BackendLaunchBody,
}

/// Wire form of [`AuthRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequestBody {
    /// The chosen auth mode.
    pub mode: AuthMode,
    /// Informational provider identifier.
    #[serde(default, rename = "providerKey")]
    pub provider_key: Option<String>,
    /// Where the key comes from.
    #[serde(rename = "apiKeyRef")]
    pub api_key_ref: ApiKeyRef,
    /// Inline key material, when `api_key_ref = inline`.
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    /// Stored credential id, when `api_key_ref = stored`.
    #[serde(default, rename = "storedCredentialId")]
    pub stored_credential_id: Option<String>,
}

impl From<AuthRequestBody> for AuthRequest {
    fn from(body: AuthRequestBody) -> Self {
        Self {
            mode: body.mode,
            provider_key: body.provider_key,
            api_key_ref: body.api_key_ref,
            api_key: body.api_key,
            stored_credential_id: body.stored_credential_id,
        }
    }
}

/// Wire form of [`WorkingDirectoryRequest`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkingDirectoryBody {
    /// Use this path directly.
    RepoPath {
        /// The filesystem path.
        path: PathBuf,
    },
    /// Ask the worktree manager to prepare a workspace.
    WorkspaceId {
        /// The workspace identifier.
        id: String,
    },
}

impl From<WorkingDirectoryBody> for WorkingDirectoryRequest {
    fn from(body: WorkingDirectoryBody) -> Self {
        match body {
            WorkingDirectoryBody::RepoPath { path } => Self::RepoPath(path),
            WorkingDirectoryBody::WorkspaceId { id } => Self::WorkspaceId(id),
        }
    }
}

/// Wire form of [`BackendLaunch`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendLaunchBody {
    /// Spawn a subprocess speaking ACP over stdio.
    Subprocess {
        /// Executable to run.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
        /// MCP servers to advertise in `session/new`.
        #[serde(default, rename = "mcpServers")]
        mcp_servers: Vec<Value>,
    },
    /// Drive an in-process SDK query.
    Sdk {
        /// The first `sendPrompt`'s options.
        #[serde(default)]
        options: SdkQueryOptions,
    },
}

impl From<BackendLaunchBody> for BackendLaunch {
    fn from(body: BackendLaunchBody) -> Self {
        match body {
            BackendLaunchBody::Subprocess { command, args, mcp_servers } => {
                Self::Subprocess { command, args, mcp_servers }
            },
            BackendLaunchBody::Sdk { options } => Self::Sdk { options },
        }
    }
}

impl From<CreateSessionBody> for CreateSessionRequest {
    fn from(body: CreateSessionBody) -> Self {
        Self {
            auth: body.auth.into(),
            env: body.env,
            working_directory: body.working_directory.into(),
            launch: body.launch.into(),
        }
    }
}

/// `POST /v1/sessions`, `GET /v1/sessions/:id`, `GET /v1/sessions/:id/connect`
/// response body.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfoBody {
    /// The session id.
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Whether this handle came from reattaching a persisted session.
    pub restored: bool,
}

/// `GET /v1/sessions` response body.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListBody {
    /// Every currently live session.
    pub sessions: Vec<SessionInfoBody>,
}

/// A persisted, resumable session summary (`listResumable`, spec §4.5).
#[derive(Debug, Clone, Serialize)]
pub struct ResumableSessionBody {
    /// The session id.
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    /// Last known lifecycle state (always `idle` for a resumable record).
    pub state: SessionState,
    /// Resolved working directory.
    #[serde(rename = "workingDirectory")]
    pub working_directory: PathBuf,
    /// When the session was created.
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the session was last active.
    #[serde(rename = "lastActivity")]
    pub last_activity: chrono::DateTime<chrono::Utc>,
}

impl From<SessionRecord> for ResumableSessionBody {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.session_id,
            state: record.state,
            working_directory: record.working_directory,
            created_at: record.created_at,
            last_activity: record.last_activity,
        }
    }
}

/// A typed control message carried over `POST /v1/sessions/:id/rpc` or a
/// `/ws` text frame (spec §4.6: "typed control messages" branch of the
/// dual frame shape). Text that fails to parse as one of these variants
/// is tried as a raw JSON-RPC frame instead (subprocess sessions only —
/// see `brokerd_gateway::server::handle_ws`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Send a prompt (spec §4.3 `sendPrompt`).
    SendPrompt {
        /// The prompt text.
        text: String,
        /// SDK query options for this turn (ignored for subprocess
        /// sessions, which carry no per-turn options).
        #[serde(default)]
        options: SdkQueryOptions,
    },
    /// Cancel the in-flight prompt.
    CancelPrompt,
    /// Resolve a pending permission request.
    ResolvePermission {
        /// The tool-call id the permission request was raised for.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// The chosen option id, or `None` to deny with no selection.
        #[serde(default, rename = "optionId")]
        option_id: Option<String>,
        /// Structured answers accompanying the decision.
        #[serde(default)]
        answers: Option<Value>,
    },
    /// Cancel a pending permission request outright.
    CancelPermission {
        /// The tool-call id to cancel.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
    /// Query supported models (SDK sessions only).
    GetSupportedModels,
    /// Query account info (SDK sessions only).
    GetAccountInfo,
    /// Query MCP server status (SDK sessions only).
    GetMcpServerStatus,
    /// Query supported slash commands (SDK sessions only).
    GetSupportedCommands,
    /// Change the permission mode (SDK sessions only).
    SetPermissionMode {
        /// The new mode.
        mode: String,
    },
    /// Change the active model (SDK sessions only).
    SetModel {
        /// The new model identifier.
        model: String,
    },
    /// Change the thinking-token budget (SDK sessions only).
    SetMaxThinkingTokens {
        /// The new budget.
        #[serde(rename = "maxThinkingTokens")]
        max_thinking_tokens: u32,
    },
    /// Replace the MCP server configuration (SDK sessions only).
    SetMcpServers {
        /// The new server blocks, keyed by name.
        #[serde(rename = "mcpServers")]
        mcp_servers: HashMap<String, Value>,
    },
    /// Roll back file edits to an earlier checkpoint (SDK sessions only).
    RewindFiles {
        /// The checkpoint identifier to rewind to.
        #[serde(rename = "checkpointId")]
        checkpoint_id: String,
    },
    /// Merge an arbitrary subset of spec §9 configuration fields into
    /// the session's stored config snapshot.
    UpdateConfig {
        /// The fields to merge in, keyed as in the §9 configuration
        /// table.
        config: Value,
    },
}

/// `POST/GET/DELETE /v1/credentials` bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreCredentialBody {
    /// The credential id to store under.
    #[serde(rename = "credentialId")]
    pub credential_id: String,
    /// The plaintext secret to seal.
    pub plaintext: String,
}

/// `GET /v1/credentials` response body.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialListBody {
    /// Every stored credential id (never the plaintext).
    #[serde(rename = "credentialIds")]
    pub credential_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_body_deserializes_a_subprocess_launch() {
        let json = serde_json::json!({
            "auth": {"mode": "none", "apiKeyRef": "none"},
            "workingDirectory": {"kind": "repo_path", "path": "/tmp/repo"},
            "launch": {"kind": "subprocess", "command": "claude-code-acp"},
        });
        let body: CreateSessionBody = serde_json::from_value(json).unwrap();
        assert!(matches!(body.launch, BackendLaunchBody::Subprocess { .. }));
    }

    #[test]
    fn control_message_tags_on_type() {
        let json = serde_json::json!({"type": "cancel_prompt"});
        let msg: ControlMessage = serde_json::from_value(json).unwrap();
        assert!(matches!(msg, ControlMessage::CancelPrompt));
    }

    #[test]
    fn resolve_permission_defaults_option_id_and_answers_to_none() {
        let json = serde_json::json!({"type": "resolve_permission", "toolCallId": "tc1"});
        let msg: ControlMessage = serde_json::from_value(json).unwrap();
        match msg {
            ControlMessage::ResolvePermission { tool_call_id, option_id, answers } => {
                assert_eq!(tool_call_id, "tc1");
                assert_eq!(option_id, None);
                assert_eq!(answers, None);
            },
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
