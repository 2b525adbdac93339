//! `SessionManager` (spec §4.5): the exclusive owner of every session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use brokerd_approval::{ApiKeyRef, AuthRequest, HostedAuthPolicy, PermissionTable};
use brokerd_audit::SessionEventEntry;
use brokerd_core::SessionId;
use brokerd_protocol::acp::StopReason;
use brokerd_crypto::MasterKey;
use brokerd_events::Fanout;
use brokerd_sdk::{SdkClient, SdkQueryOptions};
use brokerd_storage::{BackendKind, PersistenceAdapter, SessionRecord, SessionState};
use brokerd_terminal::TerminalManager;
use brokerd_workspace::{resolve, WorkingDirectoryRequest, WorktreeManager};

use crate::credential::{resolve_stored_key, CredentialStore};
use crate::error::{SessionError, SessionResult};
use crate::sdk::{SdkDeps, SdkSession};
use crate::subprocess::{SubprocessDeps, SubprocessLaunchConfig, SubprocessSession, DEFAULT_MAX_MESSAGE_SIZE};

/// Default cap on concurrently live sessions (spec §4.5: "default 50").
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 50;
/// Default idle-eviction timeout (spec §5).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
/// Default per-outbound-request timeout (spec §5, subprocess sessions only).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Backend-specific launch parameters for a newly created session.
pub enum BackendLaunch {
    /// Spawn a subprocess speaking ACP over stdio.
    Subprocess {
        /// Executable to run.
        command: String,
        /// Arguments.
        args: Vec<String>,
        /// MCP servers to advertise in `session/new`.
        mcp_servers: Vec<Value>,
    },
    /// Drive an in-process SDK query.
    Sdk {
        /// The options the first `sendPrompt` will use.
        options: SdkQueryOptions,
    },
}

/// A session-creation request (spec §4.5, §4.8).
pub struct CreateSessionRequest {
    /// Hosted-auth policy input.
    pub auth: AuthRequest,
    /// Raw environment overrides; agent secrets require policy sign-off
    /// (spec §4.8).
    pub env: HashMap<String, String>,
    /// Where the session's working directory should come from.
    pub working_directory: WorkingDirectoryRequest,
    /// Which kind of backend to start, and with what.
    pub launch: BackendLaunch,
}

/// What `create`/`get`/`connect` hand back to the caller.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// The client-visible session id.
    pub session_id: SessionId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Whether this handle came from reattaching a persisted session
    /// rather than a live one (spec §4.5 `connect`: "`{restored: true}`").
    pub restored: bool,
}

enum Backend {
    Subprocess(SubprocessSession),
    Sdk(SdkSession),
}

impl Backend {
    fn session_id(&self) -> SessionId {
        match self {
            Self::Subprocess(s) => s.session_id(),
            Self::Sdk(s) => s.session_id(),
        }
    }

    async fn state(&self) -> SessionState {
        match self {
            Self::Subprocess(s) => s.state().await,
            Self::Sdk(s) => s.state().await,
        }
    }

    async fn terminate(&self) -> SessionResult<()> {
        match self {
            Self::Subprocess(s) => s.terminate().await,
            Self::Sdk(s) => s.terminate().await,
        }
    }

    async fn send_prompt(&self, text: String, options: SdkQueryOptions) -> SessionResult<StopReason> {
        match self {
            Self::Subprocess(s) => s.send_prompt(text).await,
            Self::Sdk(s) => s.send_prompt(text, options).await,
        }
    }

    async fn cancel_prompt(&self) -> SessionResult<()> {
        match self {
            Self::Subprocess(s) => s.cancel_prompt().await,
            Self::Sdk(s) => s.cancel_prompt().await,
        }
    }

    async fn resolve_permission(&self, tool_call_id: &str, option_id: Option<String>, answers: Option<Value>) -> SessionResult<()> {
        match self {
            Self::Subprocess(s) => s.resolve_permission(tool_call_id, option_id, answers).await,
            Self::Sdk(s) => s.resolve_permission(tool_call_id, option_id, answers).await,
        }
    }

    async fn cancel_permission(&self, tool_call_id: &str) -> SessionResult<()> {
        match self {
            Self::Subprocess(s) => s.cancel_permission(tool_call_id).await,
            Self::Sdk(s) => s.cancel_permission(tool_call_id).await,
        }
    }

    fn fanout(&self) -> Fanout {
        match self {
            Self::Subprocess(s) => s.fanout(),
            Self::Sdk(s) => s.fanout(),
        }
    }

    fn as_sdk(&self) -> SessionResult<&SdkSession> {
        match self {
            Self::Sdk(s) => Ok(s),
            Self::Subprocess(_) => Err(SessionError::MethodNotFound("not supported for a subprocess-backed session".into())),
        }
    }

    async fn send_raw_frame(&self, text: &str) -> SessionResult<()> {
        match self {
            Self::Subprocess(s) => s.send_raw_frame(text).await,
            Self::Sdk(_) => {
                Err(SessionError::MethodNotFound("raw JSON-RPC frames are not accepted by SDK-backed sessions".into()))
            }
        }
    }
}

/// External collaborators the manager needs beyond what each session
/// constructs for itself.
pub struct SessionManagerDeps {
    /// Where session/transcript state is persisted.
    pub persistence: Arc<dyn PersistenceAdapter>,
    /// Which auth modes are permitted in this deployment (spec §4.8).
    pub auth_policy: HostedAuthPolicy,
    /// Where stored credentials are fetched from.
    pub credential_store: Arc<dyn CredentialStore>,
    /// The deployment's credential-envelope master key.
    pub master_key: Arc<MasterKey>,
    /// Prepares working directories for `workspaceId`-style requests.
    pub worktree_manager: Arc<dyn WorktreeManager>,
    /// Shared client used to start and resume SDK-backed sessions.
    pub sdk_client: Arc<dyn SdkClient>,
    /// Cap on concurrently live sessions.
    pub max_concurrent_sessions: usize,
    /// Per-session idle-eviction timeout.
    pub idle_timeout: Duration,
    /// Per-outbound-request timeout (subprocess sessions only).
    pub request_timeout: Duration,
}

impl SessionManagerDeps {
    /// Build deps with the spec's default limits and timeouts, given
    /// only the collaborators that have no sensible default.
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceAdapter>,
        credential_store: Arc<dyn CredentialStore>,
        master_key: Arc<MasterKey>,
        worktree_manager: Arc<dyn WorktreeManager>,
        sdk_client: Arc<dyn SdkClient>,
    ) -> Self {
        Self {
            persistence,
            auth_policy: HostedAuthPolicy::default(),
            credential_store,
            master_key,
            worktree_manager,
            sdk_client,
            max_concurrent_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Process-wide registry of sessions (spec §4.5).
///
/// Exclusively owns every [`Backend`]; subscribers hold only a session
/// id and a subscription token (spec §3's ownership note), never a
/// reference into this registry.
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<Backend>>>,
    persistence: Arc<dyn PersistenceAdapter>,
    auth_policy: HostedAuthPolicy,
    credential_store: Arc<dyn CredentialStore>,
    master_key: Arc<MasterKey>,
    worktree_manager: Arc<dyn WorktreeManager>,
    sdk_client: Arc<dyn SdkClient>,
    max_concurrent_sessions: usize,
    idle_timeout: Duration,
    request_timeout: Duration,
}

impl SessionManager {
    /// Construct an empty registry.
    #[must_use]
    pub fn new(deps: SessionManagerDeps) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            persistence: deps.persistence,
            auth_policy: deps.auth_policy,
            credential_store: deps.credential_store,
            master_key: deps.master_key,
            worktree_manager: deps.worktree_manager,
            sdk_client: deps.sdk_client,
            max_concurrent_sessions: deps.max_concurrent_sessions,
            idle_timeout: deps.idle_timeout,
            request_timeout: deps.request_timeout,
        }
    }

    /// `create` (spec §4.5): validate, resolve auth and working
    /// directory, start the backend, persist, and register.
    pub async fn create(&self, request: CreateSessionRequest) -> SessionResult<SessionHandle> {
        self.auth_policy.validate(&request.auth, Some(&request.env))?;
        self.enforce_session_cap().await?;

        let resolved_key = self.resolve_auth_material(&request.auth).await?;
        let working_directory = resolve(&request.working_directory, self.worktree_manager.as_ref()).await?;

        let session_id = SessionId::new();
        let fanout = Fanout::new();
        let permissions = Arc::new(PermissionTable::new());

        let (backend_kind, config_snapshot, backend) = match request.launch {
            BackendLaunch::Subprocess { command, args, mcp_servers } => {
                let mut env = request.env.clone();
                if let Some(key) = &resolved_key {
                    env.entry(env_var_for(&request.auth)).or_insert_with(|| key.clone());
                }
                let config = SubprocessLaunchConfig {
                    command: command.clone(),
                    args: args.clone(),
                    cwd: working_directory.clone(),
                    env,
                    mcp_servers: mcp_servers.clone(),
                };
                let deps = SubprocessDeps {
                    session_id,
                    fanout: fanout.clone(),
                    permissions: Arc::clone(&permissions),
                    terminals: Arc::new(TerminalManager::new()),
                    persistence: Arc::clone(&self.persistence),
                    request_timeout: self.request_timeout,
                    idle_timeout: self.idle_timeout,
                    max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                    create_parent_dirs_on_write: false,
                };
                let snapshot = serde_json::json!({"command": command, "args": args, "mcpServers": mcp_servers});
                let session = SubprocessSession::spawn(config, deps).await?;
                (BackendKind::Subprocess, snapshot, Backend::Subprocess(session))
            }
            BackendLaunch::Sdk { options } => {
                // The SDK client is an external collaborator that
                // resolves its own credentials out of band (spec §1
                // Non-goals); `resolved_key` has no further use here.
                let snapshot = serde_json::to_value(&options).unwrap_or(Value::Null);
                let deps = SdkDeps {
                    session_id,
                    fanout: fanout.clone(),
                    permissions: Arc::clone(&permissions),
                    persistence: Arc::clone(&self.persistence),
                    idle_timeout: self.idle_timeout,
                };
                let session = SdkSession::new(Arc::clone(&self.sdk_client), deps);
                (BackendKind::InProcess, snapshot, Backend::Sdk(session))
            }
        };

        let state = backend.state().await;
        let now = chrono::Utc::now();
        let record = SessionRecord {
            session_id,
            backend_id: None,
            backend_kind,
            config_snapshot,
            working_directory,
            state,
            created_at: now,
            last_activity: now,
        };
        self.persistence.put_session(record).await?;
        self.sessions.lock().await.insert(session_id, Arc::new(backend));
        self.record_event(session_id, "session_created", serde_json::json!({"backendKind": backend_kind})).await;

        Ok(SessionHandle { session_id, state, restored: false })
    }

    /// `list` (spec §4.5): every currently live session.
    pub async fn list(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.lock().await;
        let mut handles = Vec::with_capacity(sessions.len());
        for backend in sessions.values() {
            handles.push(SessionHandle { session_id: backend.session_id(), state: backend.state().await, restored: false });
        }
        handles
    }

    /// `get` (spec §4.5): look up one live session.
    pub async fn get(&self, session_id: SessionId) -> SessionResult<SessionHandle> {
        let sessions = self.sessions.lock().await;
        let backend = sessions.get(&session_id).ok_or(SessionError::SessionNotFound)?;
        Ok(SessionHandle { session_id, state: backend.state().await, restored: false })
    }

    /// `delete` (spec §4.5): terminate and unregister. Idempotent —
    /// deleting an already-gone session id is not an error.
    pub async fn delete(&self, session_id: SessionId) -> SessionResult<()> {
        let Some(backend) = self.sessions.lock().await.remove(&session_id) else {
            return Ok(());
        };
        backend.terminate().await?;
        if let Some(mut record) = self.persistence.get_session(session_id).await? {
            record.state = SessionState::Terminated;
            self.persistence.put_session(record).await?;
        }
        self.record_event(session_id, "session_deleted", Value::Null).await;
        Ok(())
    }

    /// `listResumable` (spec §4.5): every persisted session flagged
    /// Idle with a known backend id.
    pub async fn list_resumable(&self) -> SessionResult<Vec<SessionRecord>> {
        Ok(self.persistence.list_resumable().await?)
    }

    /// Called once on gateway startup: every persisted session is
    /// transitioned to Idle (spec §4.5: "no session remains in-memory
    /// active across a restart").
    pub async fn mark_all_idle_on_startup(&self) -> SessionResult<()> {
        Ok(self.persistence.mark_all_idle_on_startup().await?)
    }

    /// `connect` (spec §4.5): attach to a live session, or reconstruct
    /// and resume a persisted-Idle one from its stored configuration
    /// snapshot and backend id.
    pub async fn connect(&self, session_id: SessionId) -> SessionResult<SessionHandle> {
        if let Some(backend) = self.sessions.lock().await.get(&session_id) {
            return Ok(SessionHandle { session_id, state: backend.state().await, restored: false });
        }

        let record = self.persistence.get_session(session_id).await?.ok_or(SessionError::SessionNotFound)?;
        if !record.is_resumable() {
            return Err(SessionError::NotResumable(session_id.to_string()));
        }
        let backend_id = record.backend_id.clone().ok_or_else(|| SessionError::NotResumable(session_id.to_string()))?;
        self.enforce_session_cap().await?;

        let fanout = Fanout::new();
        let permissions = Arc::new(PermissionTable::new());

        let backend = match record.backend_kind {
            BackendKind::Subprocess => {
                let (command, args, mcp_servers) = subprocess_launch_from_snapshot(&record.config_snapshot)?;
                let config = SubprocessLaunchConfig {
                    command,
                    args,
                    cwd: record.working_directory.clone(),
                    env: HashMap::new(),
                    mcp_servers,
                };
                let deps = SubprocessDeps {
                    session_id,
                    fanout,
                    permissions,
                    terminals: Arc::new(TerminalManager::new()),
                    persistence: Arc::clone(&self.persistence),
                    request_timeout: self.request_timeout,
                    idle_timeout: self.idle_timeout,
                    max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
                    create_parent_dirs_on_write: false,
                };
                Backend::Subprocess(SubprocessSession::spawn(config, deps).await?)
            }
            BackendKind::InProcess => {
                // `SdkQueryOptions` is only ever consumed per-prompt, not
                // held by the session itself, so reattaching needs no
                // more than fresh deps; the next `sendPrompt` call is
                // responsible for passing `SdkQueryOptions::with_resume`
                // if it wants to continue the backend's prior query.
                let _ = &backend_id;
                let deps = SdkDeps { session_id, fanout, permissions, persistence: Arc::clone(&self.persistence), idle_timeout: self.idle_timeout };
                Backend::Sdk(SdkSession::new(Arc::clone(&self.sdk_client), deps))
            }
        };

        let state = backend.state().await;
        self.sessions.lock().await.insert(session_id, Arc::new(backend));

        let mut updated = record;
        updated.state = state;
        updated.last_activity = chrono::Utc::now();
        self.persistence.put_session(updated).await?;
        self.record_event(session_id, "session_resumed", Value::Null).await;

        Ok(SessionHandle { session_id, state, restored: true })
    }

    /// Append a [`SessionEventEntry`] for a registry-level lifecycle
    /// transition (spec §3's session-event log). Best-effort.
    async fn record_event(&self, session_id: SessionId, event_type: &str, payload: Value) {
        let entry = SessionEventEntry::new(session_id, event_type, payload);
        if let Err(err) = self.persistence.append_session_event(entry).await {
            tracing::warn!(session_id = %session_id, %err, "failed to append session event");
        }
    }

    /// Send a prompt to a live session (spec §4.3, §4.6 `user_message`).
    ///
    /// `options` is only consulted for SDK-backed sessions; a
    /// subprocess-backed session ignores it (its only inputs are the
    /// prompt text, per ACP's `session/prompt`).
    pub async fn send_prompt(&self, session_id: SessionId, text: impl Into<String>, options: SdkQueryOptions) -> SessionResult<StopReason> {
        let backend = self.get_backend(session_id).await?;
        backend.send_prompt(text.into(), options).await
    }

    /// Cancel the in-flight prompt, if any (spec §4.6 `cancel`).
    pub async fn cancel_prompt(&self, session_id: SessionId) -> SessionResult<()> {
        let backend = self.get_backend(session_id).await?;
        backend.cancel_prompt().await
    }

    /// Resolve a pending permission request (spec §4.7).
    pub async fn resolve_permission(
        &self,
        session_id: SessionId,
        tool_call_id: &str,
        option_id: Option<String>,
        answers: Option<Value>,
    ) -> SessionResult<()> {
        let backend = self.get_backend(session_id).await?;
        backend.resolve_permission(tool_call_id, option_id, answers).await
    }

    /// Cancel a pending permission request (spec §4.7 `cancelPermission`).
    pub async fn cancel_permission(&self, session_id: SessionId, tool_call_id: &str) -> SessionResult<()> {
        let backend = self.get_backend(session_id).await?;
        backend.cancel_permission(tool_call_id).await
    }

    /// Relay a raw JSON-RPC frame verbatim to a subprocess-backed
    /// session's stdin (spec §4.6(a)). Rejected for SDK-backed sessions,
    /// which only accept typed control messages.
    pub async fn send_raw_frame(&self, session_id: SessionId, text: &str) -> SessionResult<()> {
        let backend = self.get_backend(session_id).await?;
        backend.send_raw_frame(text).await
    }

    /// `update_config` (spec §4.6): merge an arbitrary subset of the
    /// spec §9 configuration fields into the session's stored config
    /// snapshot. This is a metadata-only update; live backends are not
    /// reconfigured by it — use the specific `set_*` mutators for that.
    pub async fn update_config(&self, session_id: SessionId, patch: Value) -> SessionResult<()> {
        let mut record = self.persistence.get_session(session_id).await?.ok_or(SessionError::SessionNotFound)?;
        merge_json(&mut record.config_snapshot, patch);
        self.persistence.put_session(record).await?;
        Ok(())
    }

    /// `get_supported_models` (spec §4.6, SDK-backed sessions only).
    pub async fn supported_models(&self, session_id: SessionId) -> SessionResult<brokerd_sdk::SupportedModels> {
        self.get_backend(session_id).await?.as_sdk()?.supported_models().await
    }

    /// `get_account_info` (spec §4.6, SDK-backed sessions only).
    pub async fn account_info(&self, session_id: SessionId) -> SessionResult<brokerd_sdk::AccountInfo> {
        self.get_backend(session_id).await?.as_sdk()?.account_info().await
    }

    /// `get_mcp_status` (spec §4.6, SDK-backed sessions only).
    pub async fn mcp_server_status(&self, session_id: SessionId) -> SessionResult<brokerd_sdk::McpServerStatus> {
        self.get_backend(session_id).await?.as_sdk()?.mcp_server_status().await
    }

    /// `get_supported_commands` (spec §4.6, SDK-backed sessions only).
    pub async fn supported_commands(&self, session_id: SessionId) -> SessionResult<brokerd_sdk::SupportedCommands> {
        self.get_backend(session_id).await?.as_sdk()?.supported_commands().await
    }

    /// `set_permission_mode` (spec §4.6, SDK-backed sessions only).
    pub async fn set_permission_mode(&self, session_id: SessionId, mode: &str) -> SessionResult<()> {
        self.get_backend(session_id).await?.as_sdk()?.set_permission_mode(mode).await
    }

    /// `set_model` (spec §4.6, SDK-backed sessions only).
    pub async fn set_model(&self, session_id: SessionId, model: &str) -> SessionResult<()> {
        self.get_backend(session_id).await?.as_sdk()?.set_model(model).await
    }

    /// `set_thinking_tokens` (spec §4.6, SDK-backed sessions only).
    pub async fn set_max_thinking_tokens(&self, session_id: SessionId, tokens: u32) -> SessionResult<()> {
        self.get_backend(session_id).await?.as_sdk()?.set_max_thinking_tokens(tokens).await
    }

    /// `set_mcp_servers` (spec §4.6, SDK-backed sessions only).
    pub async fn set_mcp_servers(&self, session_id: SessionId, servers: Value) -> SessionResult<()> {
        self.get_backend(session_id).await?.as_sdk()?.set_mcp_servers(servers).await
    }

    /// `rewind_files` (spec §4.6, SDK-backed sessions only).
    pub async fn rewind_files(&self, session_id: SessionId, checkpoint: &str) -> SessionResult<()> {
        self.get_backend(session_id).await?.as_sdk()?.rewind_files(checkpoint).await
    }

    /// Subscribe to a live session's event fan-out (spec §4.6: the
    /// basis for both the SSE stream and the `WebSocket` surface).
    pub async fn subscribe(
        &self,
        session_id: SessionId,
        capacity: usize,
    ) -> SessionResult<(brokerd_events::SubscriptionToken, tokio::sync::mpsc::Receiver<brokerd_events::SessionEvent>)> {
        let backend = self.get_backend(session_id).await?;
        Ok(backend.fanout().subscribe(capacity).await)
    }

    /// Detach a subscriber registered via [`Self::subscribe`].
    pub async fn unsubscribe(&self, session_id: SessionId, token: brokerd_events::SubscriptionToken) {
        if let Ok(backend) = self.get_backend(session_id).await {
            backend.fanout().unsubscribe(token).await;
        }
    }

    async fn get_backend(&self, session_id: SessionId) -> SessionResult<Arc<Backend>> {
        self.sessions.lock().await.get(&session_id).cloned().ok_or(SessionError::SessionNotFound)
    }

    async fn enforce_session_cap(&self) -> SessionResult<()> {
        let sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_concurrent_sessions {
            return Err(SessionError::MaxSessionsReached);
        }
        Ok(())
    }

    async fn resolve_auth_material(&self, auth: &AuthRequest) -> SessionResult<Option<String>> {
        match auth.api_key_ref {
            ApiKeyRef::Stored => {
                let credential_id = auth
                    .stored_credential_id
                    .as_deref()
                    .ok_or_else(|| SessionError::Internal("stored auth mode requires storedCredentialId".into()))?;
                let key = resolve_stored_key(self.credential_store.as_ref(), credential_id, &self.master_key).await?;
                Ok(Some(key))
            }
            ApiKeyRef::Inline => Ok(auth.api_key.clone()),
            ApiKeyRef::None => Ok(None),
        }
    }
}

/// The environment variable a resolved key is injected under, named
/// after the request's provider key when one was given.
fn env_var_for(auth: &AuthRequest) -> String {
    match &auth.provider_key {
        Some(provider) => format!("{}_API_KEY", provider.to_uppercase()),
        None => "AGENT_API_KEY".to_string(),
    }
}

/// Merge `patch`'s top-level fields into `base` (spec §4.6
/// `update_config`: "an arbitrary subset of configuration fields").
/// Non-object patches replace `base` outright.
fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
        }
        (base, patch) => *base = patch,
    }
}

fn subprocess_launch_from_snapshot(snapshot: &Value) -> SessionResult<(String, Vec<String>, Vec<Value>)> {
    let command = snapshot
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| SessionError::Internal("config snapshot missing command".into()))?
        .to_string();
    let args = snapshot.get("args").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default();
    let mcp_servers = snapshot.get("mcpServers").and_then(Value::as_array).cloned().unwrap_or_default();
    Ok((command, args, mcp_servers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brokerd_crypto::Envelope;
    use brokerd_sdk::{PermissionCallback, SdkMessage, SdkMessageStream, SdkQuery, SdkQueryHandle, SdkResult};
    use brokerd_storage::{KvPersistenceAdapter, MemoryKvStore};
    use futures::stream;
    use std::path::PathBuf;

    struct NoopCredentialStore;

    #[async_trait]
    impl CredentialStore for NoopCredentialStore {
        async fn load_envelope(&self, credential_id: &str) -> SessionResult<Envelope> {
            Err(SessionError::Internal(format!("no credential store configured for {credential_id}")))
        }
    }

    struct AlwaysCwdWorktreeManager;

    #[async_trait]
    impl WorktreeManager for AlwaysCwdWorktreeManager {
        async fn prepare(&self, _workspace_id: &str) -> brokerd_workspace::WorkspaceResult<PathBuf> {
            Ok(std::env::temp_dir())
        }
    }

    struct StubHandle;

    #[async_trait]
    impl SdkQueryHandle for StubHandle {
        async fn interrupt(&self) -> SdkResult<()> {
            Ok(())
        }
        async fn set_permission_mode(&self, _mode: &str) -> SdkResult<()> {
            Ok(())
        }
        async fn set_model(&self, _model: &str) -> SdkResult<()> {
            Ok(())
        }
        async fn set_max_thinking_tokens(&self, _tokens: u32) -> SdkResult<()> {
            Ok(())
        }
        async fn set_mcp_servers(&self, _servers: Value) -> SdkResult<()> {
            Ok(())
        }
        async fn rewind_files(&self, _checkpoint: &str) -> SdkResult<()> {
            Ok(())
        }
        async fn supported_models(&self) -> SdkResult<brokerd_sdk::SupportedModels> {
            Ok(brokerd_sdk::SupportedModels::default())
        }
        async fn account_info(&self) -> SdkResult<brokerd_sdk::AccountInfo> {
            Ok(brokerd_sdk::AccountInfo::default())
        }
        async fn mcp_server_status(&self) -> SdkResult<brokerd_sdk::McpServerStatus> {
            Ok(brokerd_sdk::McpServerStatus::default())
        }
        async fn supported_commands(&self) -> SdkResult<brokerd_sdk::SupportedCommands> {
            Ok(brokerd_sdk::SupportedCommands::default())
        }
    }

    struct StubClient;

    #[async_trait]
    impl SdkClient for StubClient {
        async fn query(&self, _prompt: String, _options: SdkQueryOptions, _cb: PermissionCallback) -> SdkResult<SdkQuery> {
            let messages: SdkMessageStream =
                Box::pin(stream::iter(vec![Ok(SdkMessage::classify(serde_json::json!({"type": "result", "result": {}})))]));
            Ok(SdkQuery { messages, handle: Arc::new(StubHandle) })
        }
    }

    fn manager(max_concurrent_sessions: usize) -> SessionManager {
        let mut deps = SessionManagerDeps::new(
            Arc::new(KvPersistenceAdapter::new(Arc::new(MemoryKvStore::new()))),
            Arc::new(NoopCredentialStore),
            Arc::new(MasterKey::new("test-master-key")),
            Arc::new(AlwaysCwdWorktreeManager),
            Arc::new(StubClient),
        );
        deps.max_concurrent_sessions = max_concurrent_sessions;
        SessionManager::new(deps)
    }

    fn sdk_request() -> CreateSessionRequest {
        CreateSessionRequest {
            auth: AuthRequest { mode: brokerd_approval::AuthMode::None, provider_key: None, api_key_ref: ApiKeyRef::None, api_key: None, stored_credential_id: None },
            env: HashMap::new(),
            working_directory: WorkingDirectoryRequest::RepoPath(std::env::temp_dir()),
            launch: BackendLaunch::Sdk { options: SdkQueryOptions::new() },
        }
    }

    #[tokio::test]
    async fn creating_an_sdk_session_registers_it_and_persists_a_record() {
        let manager = manager(DEFAULT_MAX_CONCURRENT_SESSIONS);
        let handle = manager.create(sdk_request()).await.unwrap();
        assert!(!handle.restored);
        assert!(manager.get(handle.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn creation_beyond_the_cap_fails_with_a_retriable_error() {
        let manager = manager(1);
        manager.create(sdk_request()).await.unwrap();
        let err = manager.create(sdk_request()).await.unwrap_err();
        assert!(matches!(err, SessionError::MaxSessionsReached));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let manager = manager(DEFAULT_MAX_CONCURRENT_SESSIONS);
        let handle = manager.create(sdk_request()).await.unwrap();
        manager.delete(handle.session_id).await.unwrap();
        manager.delete(handle.session_id).await.unwrap();
        assert!(matches!(manager.get(handle.session_id).await, Err(SessionError::SessionNotFound)));
    }

    #[tokio::test]
    async fn a_subscriber_observes_the_prompt_completion_event() {
        let manager = manager(DEFAULT_MAX_CONCURRENT_SESSIONS);
        let handle = manager.create(sdk_request()).await.unwrap();

        let (_token, mut rx) = manager.subscribe(handle.session_id, 16).await.unwrap();
        manager.send_prompt(handle.session_id, "hello", SdkQueryOptions::new()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, brokerd_events::SessionEvent::PromptComplete { .. }));
    }

    #[tokio::test]
    async fn sdk_only_controls_are_rejected_against_a_missing_session() {
        let manager = manager(DEFAULT_MAX_CONCURRENT_SESSIONS);
        let missing = SessionId::new();
        assert!(matches!(manager.supported_models(missing).await, Err(SessionError::SessionNotFound)));
    }

    #[tokio::test]
    async fn an_interactive_request_is_rejected_under_the_hosted_policy() {
        let mut deps = SessionManagerDeps::new(
            Arc::new(KvPersistenceAdapter::new(Arc::new(MemoryKvStore::new()))),
            Arc::new(NoopCredentialStore),
            Arc::new(MasterKey::new("test-master-key")),
            Arc::new(AlwaysCwdWorktreeManager),
            Arc::new(StubClient),
        );
        deps.auth_policy = HostedAuthPolicy::hosted();
        let manager = SessionManager::new(deps);

        let mut request = sdk_request();
        request.auth.mode = brokerd_approval::AuthMode::Interactive;
        let err = manager.create(request).await.unwrap_err();
        assert!(matches!(err, SessionError::Approval(_)));
    }
}
