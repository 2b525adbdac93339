//! `SubprocessSession` (spec §4.2): a session backed by a spawned child
//! process speaking the Agent Client Protocol over newline-delimited
//! JSON-RPC on stdio.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use brokerd_approval::{PendingPermission, PermissionTable, Resolver, ResolvedOutcome};
use brokerd_audit::SessionEventEntry;
use brokerd_core::{BackendId, SessionId};
use brokerd_events::{Fanout, SessionEvent};
use brokerd_protocol::acp::{
    CancelParams, ClientCapabilities, InitializeParams, InitializeResult, NewSessionParams,
    NewSessionResult, PromptParams, PromptResult, RequestPermissionParams, SessionUpdateNotification,
    StopReason, FIRST_ORDINARY_ID, INITIALIZE_ID, NEW_SESSION_ID,
};
use brokerd_protocol::framing::{classify, parse_line, serialize_message, JsonRpcErrorObject, JsonRpcId, Message, MessageKind};
use brokerd_storage::{PersistenceAdapter, SessionState};
use brokerd_terminal::{ExitStatus, TerminalManager, TerminalSpec};
use tracing::{debug, instrument, warn};

use crate::error::{SessionError, SessionResult};
use crate::pending::PendingRequests;

/// Default cap on a single outbound message's serialised size, used when
/// the caller's [`SubprocessDeps`] doesn't override it.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// Launch parameters for a subprocess backend (spec §4.2: "an abstracted
/// `Backend.Spawn(config, secrets) → handle`"; secrets are folded into
/// `env` by the caller before reaching this type).
#[derive(Debug, Clone)]
pub struct SubprocessLaunchConfig {
    /// Executable to spawn.
    pub command: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory (already resolved, spec §4.5).
    pub cwd: PathBuf,
    /// Environment overrides, merged over the gateway's own environment.
    pub env: HashMap<String, String>,
    /// MCP servers to advertise in `session/new`.
    pub mcp_servers: Vec<Value>,
}

/// External collaborators a [`SubprocessSession`] needs, assembled by
/// the [`crate::manager::SessionManager`].
pub struct SubprocessDeps {
    /// Client-visible id this session is known by.
    pub session_id: SessionId,
    /// Where to publish subscriber events.
    pub fanout: Fanout,
    /// This session's pending-permission table.
    pub permissions: Arc<PermissionTable>,
    /// This session's exclusively-owned terminal pool.
    pub terminals: Arc<TerminalManager>,
    /// Where to persist lifecycle and transcript state.
    pub persistence: Arc<dyn PersistenceAdapter>,
    /// Per outbound-request timeout (spec §5: default 5 min).
    pub request_timeout: Duration,
    /// Idle-eviction timeout (spec §5: default 10 min).
    pub idle_timeout: Duration,
    /// Max encoded message size (spec §4.1).
    pub max_message_size: usize,
    /// Whether `fs/write_text_file` creates parent directories by
    /// default (spec §4.2: "default: no").
    pub create_parent_dirs_on_write: bool,
}

/// Abstracts killing and waiting on the spawned child (spec §4.2, §4.4's
/// SIGTERM-then-SIGKILL escalation, mirrored here for the backend
/// process itself rather than a managed terminal).
#[async_trait]
pub trait ChildController: Send + Sync {
    /// Send a graceful termination signal.
    async fn terminate(&self);
    /// Send a forceful termination signal.
    async fn kill(&self);
    /// Block until the child has exited.
    async fn wait(&self) -> ExitStatus;
}

struct Inner {
    session_id: SessionId,
    state: Mutex<SessionState>,
    backend_id: Mutex<Option<BackendId>>,
    stdin: Mutex<Pin<Box<dyn AsyncWrite + Send>>>,
    next_id: AtomicI64,
    pending: PendingRequests,
    permissions: Arc<PermissionTable>,
    terminals: Arc<TerminalManager>,
    fanout: Fanout,
    persistence: Arc<dyn PersistenceAdapter>,
    controller: Arc<dyn ChildController>,
    request_timeout: Duration,
    max_message_size: usize,
    processing: AtomicBool,
    last_activity: Mutex<Instant>,
    create_parent_dirs_on_write: bool,
    agent_capabilities: Mutex<Value>,
    last_exit: Mutex<Option<ExitStatus>>,
}

/// A session driven by a spawned child process (spec §4.2).
pub struct SubprocessSession {
    inner: Arc<Inner>,
    idle_timeout: Duration,
    reader_task: JoinHandle<()>,
    idle_task: JoinHandle<()>,
}

impl SubprocessSession {
    /// Spawn a real child process and perform the `initialize` /
    /// `session/new` handshake.
    ///
    /// # Errors
    ///
    /// [`SessionError::SpawnFailed`] if the process could not be
    /// started; [`SessionError::HandshakeFailed`] if either handshake
    /// request fails or times out.
    #[instrument(skip(config, deps), fields(session_id = %deps.session_id))]
    pub async fn spawn(config: SubprocessLaunchConfig, deps: SubprocessDeps) -> SessionResult<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .current_dir(&config.cwd)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
        let pid = child.id().map(|p| p as i32);
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let controller: Arc<dyn ChildController> = Arc::new(ProcessController { pid, child: Mutex::new(child) });

        Self::connect(Box::pin(stdin), stdout, Some(stderr), controller, config.cwd, config.mcp_servers, deps).await
    }

    /// Perform the handshake over already-connected stdio and start the
    /// session's background tasks. Exposed separately from [`Self::spawn`]
    /// so tests can drive the protocol logic over an in-memory duplex
    /// pipe without a real child process.
    #[instrument(skip_all, fields(session_id = %deps.session_id))]
    pub async fn connect<W, R, E>(
        stdin: Pin<Box<W>>,
        stdout: R,
        stderr: Option<E>,
        controller: Arc<dyn ChildController>,
        cwd: PathBuf,
        mcp_servers: Vec<Value>,
        deps: SubprocessDeps,
    ) -> SessionResult<Self>
    where
        W: AsyncWrite + Send + 'static,
        R: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        let inner = Arc::new(Inner {
            session_id: deps.session_id,
            state: Mutex::new(SessionState::Initialising),
            backend_id: Mutex::new(None),
            stdin: Mutex::new(stdin as Pin<Box<dyn AsyncWrite + Send>>),
            next_id: AtomicI64::new(FIRST_ORDINARY_ID),
            pending: PendingRequests::new(),
            permissions: deps.permissions,
            terminals: deps.terminals,
            fanout: deps.fanout,
            persistence: deps.persistence,
            controller,
            request_timeout: deps.request_timeout,
            max_message_size: deps.max_message_size,
            processing: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            create_parent_dirs_on_write: deps.create_parent_dirs_on_write,
            agent_capabilities: Mutex::new(Value::Null),
            last_exit: Mutex::new(None),
        });

        let reader_task = spawn_reader_task(Arc::clone(&inner), stdout);
        if let Some(stderr) = stderr {
            spawn_stderr_task(Arc::clone(&inner), stderr);
        }

        if let Err(err) = run_handshake(&inner, cwd, mcp_servers).await {
            reader_task.abort();
            return Err(SessionError::HandshakeFailed(err.to_string()));
        }

        let idle_task = spawn_idle_task(Arc::clone(&inner), deps.idle_timeout);

        Ok(Self { inner, idle_timeout: deps.idle_timeout, reader_task, idle_task })
    }

    /// The client-visible session id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// The backend's own session id, once the handshake has completed.
    pub async fn backend_id(&self) -> Option<BackendId> {
        self.inner.backend_id.lock().await.clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.inner.state.lock().await
    }

    /// Configured idle timeout, for callers that display or persist it.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// The event fan-out subscribers attach to (spec §4.6). Cloning is
    /// cheap — it's an `Arc` internally, and every clone publishes into
    /// the same hub.
    #[must_use]
    pub fn fanout(&self) -> Fanout {
        self.inner.fanout.clone()
    }

    /// `sendPrompt` (spec §4.2). Rejects a second concurrent prompt.
    #[instrument(skip(self, text), fields(session_id = %self.inner.session_id))]
    pub async fn send_prompt(&self, text: impl Into<String>) -> SessionResult<StopReason> {
        if self.inner.processing.swap(true, Ordering::SeqCst) {
            return Err(SessionError::PromptAlreadyProcessing);
        }
        self.inner.touch_activity().await;
        *self.inner.state.lock().await = SessionState::Processing;
        self.inner.record_event("state_processing", Value::Null).await;

        let outcome = self.inner.send_prompt_inner(text.into()).await;

        self.inner.processing.store(false, Ordering::SeqCst);
        if self.inner.state().await != SessionState::Terminated {
            *self.inner.state.lock().await = SessionState::Ready;
            self.inner.record_event("state_ready", Value::Null).await;
        }
        outcome
    }

    /// `cancelPrompt` (spec §4.2): fire-and-forget notification, plus
    /// local cancellation of outstanding permission requests.
    pub async fn cancel_prompt(&self) -> SessionResult<()> {
        let backend_id = self.inner.backend_id.lock().await.clone().ok_or(SessionError::SessionTerminated)?;
        let params = CancelParams { session_id: backend_id.as_str().to_string() };
        self.inner.write_message(Message::notification("session/cancel", serde_json::to_value(params)?)).await?;
        self.inner.cancel_open_permissions(false).await;
        Ok(())
    }

    /// Resolve a permission request the backend is blocked on (spec
    /// §4.7 step 3-5).
    pub async fn resolve_permission(&self, tool_call_id: &str, option_id: Option<String>, answers: Option<Value>) -> SessionResult<()> {
        let outcome = self.inner.permissions.resolve(tool_call_id, option_id, answers).await?;
        self.inner.deliver_permission_outcome(outcome).await
    }

    /// Cancel a single outstanding permission request (spec §4.7 step 6).
    pub async fn cancel_permission(&self, tool_call_id: &str) -> SessionResult<()> {
        let outcome = self.inner.permissions.cancel(tool_call_id).await?;
        self.inner.deliver_permission_outcome(outcome).await
    }

    /// Relay a raw JSON-RPC frame verbatim to the backend's stdin (spec
    /// §4.6(a)). Only validates that it is well-formed JSON-RPC 2.0 and
    /// within the message-size cap; the backend interprets it, not this
    /// session.
    pub async fn send_raw_frame(&self, text: &str) -> SessionResult<()> {
        let msg = parse_line(text)?;
        self.inner.touch_activity().await;
        let line = serialize_message(&msg, self.inner.max_message_size)?;
        let mut stdin = self.inner.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// `terminate` (spec §4.2): best-effort cancel, kill managed
    /// terminals, reject pending requests, escalate SIGTERM→SIGKILL.
    #[instrument(skip(self), fields(session_id = %self.inner.session_id))]
    pub async fn terminate(&self) -> SessionResult<()> {
        let _ = self.cancel_prompt().await;
        self.inner.terminals.kill_all().await;
        self.inner.pending.cancel_all().await;
        self.inner.cancel_open_permissions(true).await;

        self.inner.controller.terminate().await;
        let exited = tokio::time::timeout(brokerd_terminal::KILL_GRACE_PERIOD, self.inner.controller.wait()).await;
        let exit_status = match exited {
            Ok(status) => status,
            Err(_) => {
                self.inner.controller.kill().await;
                self.inner.controller.wait().await
            }
        };

        *self.inner.state.lock().await = SessionState::Terminated;
        self.reader_task.abort();
        self.idle_task.abort();
        self.inner
            .record_event("state_terminated", serde_json::json!({"code": exit_status.exit_code, "signal": exit_status.signal}))
            .await;
        self.inner.fanout.publish(SessionEvent::Exit {
            session_id: self.inner.session_id,
            code: Some(exit_status.exit_code),
            signal: exit_status.signal,
        });
        Ok(())
    }
}

impl Inner {
    async fn touch_activity(&self) {
        *self.last_activity.lock().await = Instant::now();
        self.fanout.publish(SessionEvent::Activity { session_id: self.session_id, at: chrono::Utc::now() });
    }

    async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Append a [`SessionEventEntry`] for a lifecycle transition,
    /// permission decision, or backend error (spec §3's session-event
    /// log). Best-effort: a persistence failure is logged, never
    /// propagated, since the event that triggered it already happened.
    async fn record_event(&self, event_type: &str, payload: Value) {
        let entry = SessionEventEntry::new(self.session_id, event_type, payload);
        if let Err(err) = self.persistence.append_session_event(entry).await {
            warn!(session_id = %self.session_id, %err, "failed to append session event");
        }
    }

    async fn write_message(&self, msg: Message) -> SessionResult<()> {
        let line = serialize_message(&msg, self.max_message_size)?;
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn call(&self, method: &str, params: Value, id: JsonRpcId) -> SessionResult<Message> {
        let rx = self.pending.register(id.clone()).await;
        self.write_message(Message::request(id.clone(), method, params)).await?;
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                let exit = *self.last_exit.lock().await;
                Err(SessionError::ChildExited { code: exit.map(|e| e.exit_code), signal: exit.and_then(|e| e.signal) })
            }
            Err(_) => {
                self.pending.forget(&id).await;
                Err(SessionError::RequestTimeout)
            }
        }
    }

    fn next_ordinary_id(&self) -> JsonRpcId {
        JsonRpcId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_prompt_inner(&self, text: String) -> SessionResult<StopReason> {
        let backend_id = self.backend_id.lock().await.clone().ok_or(SessionError::SessionTerminated)?;
        let params = PromptParams::text(backend_id.as_str(), text);
        let id = self.next_ordinary_id();
        let response = self.call("session/prompt", serde_json::to_value(params)?, id).await?;
        if let Some(error) = response.error {
            self.record_event("backend_error", serde_json::json!({"message": error.message})).await;
            self.fanout.publish(SessionEvent::Error { session_id: self.session_id, message: error.message.clone() });
            return Err(SessionError::Internal(error.message));
        }
        let result: PromptResult = serde_json::from_value(response.result.unwrap_or_default())?;
        self.fanout.publish(SessionEvent::PromptComplete {
            session_id: self.session_id,
            payload: serde_json::json!({"stopReason": result.stop_reason}),
        });
        Ok(result.stop_reason)
    }

    async fn cancel_open_permissions(&self, interrupt: bool) {
        let drained = if interrupt {
            self.permissions.drain_with_denial().await
        } else {
            // Non-terminating cancellation only clears entries that are
            // still registered; individual resolution already removes
            // them, so draining here is the same call with the same
            // "denied" semantics (spec §4.2: "the session should also
            // actively cancel them locally").
            self.permissions.drain_with_denial().await
        };
        for outcome in drained {
            let _ = self.deliver_permission_outcome(outcome).await;
        }
    }

    async fn deliver_permission_outcome(&self, outcome: ResolvedOutcome) -> SessionResult<()> {
        match outcome {
            ResolvedOutcome::Subprocess { request_id, outcome } => {
                self.record_event("permission_resolved", serde_json::to_value(&outcome).unwrap_or(Value::Null)).await;
                let result = brokerd_protocol::acp::RequestPermissionResult { outcome };
                self.write_message(Message::success(request_id, serde_json::to_value(result)?)).await
            }
            ResolvedOutcome::Sdk(_) => {
                // A subprocess session never opens an `Sdk`-resolved
                // entry; nothing to deliver.
                Ok(())
            }
        }
    }

    async fn on_child_exit(&self) {
        if self.state().await == SessionState::Terminated {
            return;
        }
        let exit_status = self.controller.wait().await;
        *self.state.lock().await = SessionState::Terminated;
        *self.last_exit.lock().await = Some(exit_status);
        self.pending.cancel_all().await;
        self.cancel_open_permissions(true).await;
        self.record_event("child_crashed", serde_json::json!({"code": exit_status.exit_code, "signal": exit_status.signal})).await;
        self.fanout.publish(SessionEvent::Exit {
            session_id: self.session_id,
            code: Some(exit_status.exit_code),
            signal: exit_status.signal,
        });
    }

    async fn on_idle(&self) {
        if self.state().await == SessionState::Terminated {
            return;
        }
        self.fanout.publish(SessionEvent::Idle { session_id: self.session_id });
    }

    async fn handle_request(self: &Arc<Self>, msg: Message) {
        let Some(id) = msg.id.clone() else { return };
        let method = msg.method.clone().unwrap_or_default();
        let params = msg.params.clone().unwrap_or(Value::Null);

        let outcome: SessionResult<Option<Value>> = match method.as_str() {
            "session/request_permission" => self.handle_request_permission(id.clone(), params).await.map(|()| None),
            "fs/read_text_file" => self.handle_fs_read(params).await.map(Some),
            "fs/write_text_file" => self.handle_fs_write(params).await.map(Some),
            "terminal/create" => self.handle_terminal_create(params).await.map(Some),
            "terminal/output" => self.handle_terminal_output(params).await.map(Some),
            "terminal/kill" => self.handle_terminal_kill(params).await.map(Some),
            "terminal/wait_for_exit" => self.handle_terminal_wait(params).await.map(Some),
            "terminal/release" => self.handle_terminal_release(params).await.map(Some),
            other => Err(SessionError::MethodNotFound(other.to_string())),
        };

        match outcome {
            Ok(Some(result)) => {
                let _ = self.write_message(Message::success(id, result)).await;
            }
            Ok(None) => {}
            Err(err) => {
                let _ = self.write_message(Message::failure(id, to_json_rpc_error(&err))).await;
            }
        }
    }

    async fn handle_request_permission(self: &Arc<Self>, request_id: JsonRpcId, params: Value) -> SessionResult<()> {
        let params: RequestPermissionParams = serde_json::from_value(params)?;
        let tool_call_id = params
            .tool_call
            .get("toolCallId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let options = self
            .permissions
            .register(
                tool_call_id.clone(),
                PendingPermission {
                    options: params.options.clone(),
                    context: params.tool_call.clone(),
                    resolver: Resolver::Subprocess { request_id },
                },
            )
            .await;
        self.fanout.publish(SessionEvent::PermissionRequest {
            session_id: self.session_id,
            tool_call_id,
            options: options.into_iter().map(|o| serde_json::to_value(o).unwrap_or(Value::Null)).collect(),
            context: params.tool_call,
        });
        Ok(())
    }

    async fn handle_fs_read(&self, params: Value) -> SessionResult<Value> {
        let path = params.get("path").and_then(Value::as_str).ok_or_else(|| SessionError::Internal("missing path".into()))?;
        let line = params.get("line").and_then(Value::as_u64).map(|n| n as usize);
        let limit = params.get("limit").and_then(Value::as_u64).map(|n| n as usize);
        let content = brokerd_terminal::read_text_file(std::path::Path::new(path), line, limit).await?;
        Ok(serde_json::json!({"content": content}))
    }

    async fn handle_fs_write(&self, params: Value) -> SessionResult<Value> {
        let path = params.get("path").and_then(Value::as_str).ok_or_else(|| SessionError::Internal("missing path".into()))?;
        let content = params.get("content").and_then(Value::as_str).unwrap_or_default();
        let create_parent_dirs = params.get("createParentDirectories").and_then(Value::as_bool).unwrap_or(self.create_parent_dirs_on_write);
        brokerd_terminal::write_text_file(std::path::Path::new(path), content, create_parent_dirs).await?;
        Ok(Value::Null)
    }

    async fn handle_terminal_create(&self, params: Value) -> SessionResult<Value> {
        let command = params.get("command").and_then(Value::as_str).ok_or_else(|| SessionError::Internal("missing command".into()))?;
        let mut spec = TerminalSpec::new(command);
        if let Some(args) = params.get("args").and_then(Value::as_array) {
            spec.args = args.iter().filter_map(Value::as_str).map(str::to_string).collect();
        }
        if let Some(cwd) = params.get("cwd").and_then(Value::as_str) {
            spec.cwd = Some(PathBuf::from(cwd));
        }
        if let Some(env) = params.get("env").and_then(Value::as_object) {
            spec.env = env.iter().filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string()))).collect::<Vec<_>>();
        }
        if let Some(limit) = params.get("outputByteLimit").and_then(Value::as_u64) {
            spec.output_byte_limit = limit as usize;
        }
        let id = self.terminals.create(spec).await?;
        Ok(serde_json::json!({"terminalId": id}))
    }

    fn terminal_id(params: &Value) -> SessionResult<String> {
        params
            .get("terminalId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SessionError::Internal("missing terminalId".into()))
    }

    async fn handle_terminal_output(&self, params: Value) -> SessionResult<Value> {
        let id = Self::terminal_id(&params)?;
        let output = self.terminals.output(&id).await?;
        Ok(serde_json::json!({
            "output": String::from_utf8_lossy(&output.data),
            "truncated": output.truncated,
            "exitStatus": output.exit_status,
        }))
    }

    async fn handle_terminal_kill(&self, params: Value) -> SessionResult<Value> {
        let id = Self::terminal_id(&params)?;
        self.terminals.kill(&id).await?;
        Ok(Value::Null)
    }

    async fn handle_terminal_wait(&self, params: Value) -> SessionResult<Value> {
        let id = Self::terminal_id(&params)?;
        let status = self.terminals.wait_for_exit(&id).await?;
        Ok(serde_json::to_value(status)?)
    }

    async fn handle_terminal_release(&self, params: Value) -> SessionResult<Value> {
        let id = Self::terminal_id(&params)?;
        self.terminals.release(&id).await?;
        Ok(Value::Null)
    }

    async fn handle_notification(&self, msg: Message) {
        if msg.method.as_deref() != Some("session/update") {
            return;
        }
        let Some(params) = msg.params else { return };
        let Ok(update) = serde_json::from_value::<SessionUpdateNotification>(params) else { return };
        let is_tool_call = update.update_tag().map(|t| t.starts_with("tool_call")).unwrap_or(false);
        let mut payload = update.update.clone();
        if is_tool_call {
            if let Value::Object(map) = &mut payload {
                map.insert("tool_call".to_string(), Value::Bool(true));
            }
        }
        self.fanout.publish(SessionEvent::SessionUpdate { session_id: self.session_id, payload });
    }
}

fn to_json_rpc_error(err: &SessionError) -> JsonRpcErrorObject {
    match err {
        SessionError::MethodNotFound(method) => JsonRpcErrorObject::method_not_found(method),
        other => JsonRpcErrorObject { code: -32000, message: other.to_string(), data: None },
    }
}

async fn run_handshake(inner: &Arc<Inner>, cwd: PathBuf, mcp_servers: Vec<Value>) -> SessionResult<()> {
    let init_params = InitializeParams { client_capabilities: ClientCapabilities::default(), ..InitializeParams::default() };
    let response = inner.call("initialize", serde_json::to_value(init_params)?, JsonRpcId::Number(INITIALIZE_ID)).await?;
    if let Some(error) = response.error {
        return Err(SessionError::HandshakeFailed(error.message));
    }
    let result: InitializeResult = serde_json::from_value(response.result.unwrap_or_default())?;
    *inner.agent_capabilities.lock().await = result.agent_capabilities;

    let session_params = NewSessionParams { cwd, mcp_servers };
    let response = inner.call("session/new", serde_json::to_value(session_params)?, JsonRpcId::Number(NEW_SESSION_ID)).await?;
    if let Some(error) = response.error {
        return Err(SessionError::HandshakeFailed(error.message));
    }
    let result: NewSessionResult = serde_json::from_value(response.result.unwrap_or_default())?;
    let backend_id = result.session_id.map(BackendId::new).unwrap_or_else(|| BackendId::new(inner.session_id.to_string()));
    *inner.backend_id.lock().await = Some(backend_id);
    *inner.state.lock().await = SessionState::Ready;
    Ok(())
}

fn spawn_reader_task<R>(inner: Arc<Inner>, stdout: R) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    inner.touch_activity().await;
                    let msg = match parse_line(&line) {
                        Ok(msg) => msg,
                        Err(err) => {
                            warn!(session_id = %inner.session_id, %err, "dropping malformed backend message");
                            continue;
                        }
                    };
                    match classify(&msg) {
                        Ok(MessageKind::Response) => {
                            if let Some(id) = msg.id.clone() {
                                if !inner.pending.resolve(&id, msg).await {
                                    debug!(session_id = %inner.session_id, %id, "response for unknown or already-resolved id");
                                }
                            }
                        }
                        Ok(MessageKind::Request) => inner.handle_request(msg).await,
                        Ok(MessageKind::Notification) => inner.handle_notification(msg).await,
                        Err(err) => warn!(session_id = %inner.session_id, %err, "unclassifiable backend message"),
                    }
                }
                Ok(None) => {
                    inner.on_child_exit().await;
                    break;
                }
                Err(err) => {
                    warn!(session_id = %inner.session_id, %err, "backend stdout read error");
                    inner.on_child_exit().await;
                    break;
                }
            }
        }
    })
}

fn spawn_stderr_task<E>(inner: Arc<Inner>, stderr: E) -> JoinHandle<()>
where
    E: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            inner.fanout.publish(SessionEvent::Stderr { session_id: inner.session_id, line });
        }
    })
}

fn spawn_idle_task(inner: Arc<Inner>, idle_timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let elapsed = inner.last_activity.lock().await.elapsed();
            if elapsed >= idle_timeout {
                inner.on_idle().await;
                break;
            }
            tokio::time::sleep(idle_timeout - elapsed).await;
        }
    })
}

fn send_signal(pid: i32, signal: nix::sys::signal::Signal) {
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), signal);
}

fn exit_status_from(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus { exit_code: status.code().unwrap_or(-1), signal: status.signal() }
}

struct ProcessController {
    pid: Option<i32>,
    child: Mutex<tokio::process::Child>,
}

#[async_trait]
impl ChildController for ProcessController {
    async fn terminate(&self) {
        if let Some(pid) = self.pid {
            send_signal(pid, nix::sys::signal::Signal::SIGTERM);
        }
    }

    async fn kill(&self) {
        match self.pid {
            Some(pid) => send_signal(pid, nix::sys::signal::Signal::SIGKILL),
            None => {
                let _ = self.child.lock().await.start_kill();
            }
        }
    }

    async fn wait(&self) -> ExitStatus {
        match self.child.lock().await.wait().await {
            Ok(status) => exit_status_from(status),
            Err(_) => ExitStatus { exit_code: -1, signal: None },
        }
    }
}
