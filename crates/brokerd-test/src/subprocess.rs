//! Helpers for driving [`brokerd_session::SubprocessSession`] over an
//! in-memory duplex pipe instead of a real child process, promoted from
//! `brokerd-session`'s own `subprocess` test module (its `FakeController`
//! and scripted-backend pattern) so crates outside `brokerd-session` can
//! exercise the same end-to-end scenarios through its public
//! [`brokerd_session::SubprocessSession::connect`] entry point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use brokerd_approval::PermissionTable;
use brokerd_core::SessionId;
use brokerd_events::Fanout;
use brokerd_protocol::{serialize_message, JsonRpcId, Message};
use brokerd_session::{ChildController, SubprocessDeps, DEFAULT_MAX_MESSAGE_SIZE};
use brokerd_storage::{KvPersistenceAdapter, MemoryKvStore};
use brokerd_terminal::{ExitStatus, TerminalManager};

/// A [`ChildController`] with no real process behind it; records whether
/// `terminate`/`kill` were called and lets a test post the exit status a
/// pending `wait` should resolve to, simulating the child dying on its
/// own (a crash) rather than being asked to stop.
pub struct FakeChildController {
    terminated: AtomicBool,
    killed: AtomicBool,
    exited: Notify,
    exit_status: Mutex<Option<ExitStatus>>,
}

impl FakeChildController {
    /// A controller whose child hasn't exited yet.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self { terminated: AtomicBool::new(false), killed: AtomicBool::new(false), exited: Notify::new(), exit_status: Mutex::new(None) })
    }

    /// Whether [`ChildController::terminate`] was called.
    #[must_use]
    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Whether [`ChildController::kill`] was called.
    #[must_use]
    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Record the child as exited with `status`, unblocking any pending
    /// `wait`.
    pub async fn exit(&self, status: ExitStatus) {
        *self.exit_status.lock().await = Some(status);
        self.exited.notify_waiters();
    }
}

#[async_trait]
impl ChildController for FakeChildController {
    async fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    async fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    async fn wait(&self) -> ExitStatus {
        loop {
            if let Some(status) = *self.exit_status.lock().await {
                return status;
            }
            self.exited.notified().await;
        }
    }
}

/// Minimal [`SubprocessDeps`] rooted at an in-memory store, for tests
/// that don't care about persistence behaviour.
#[must_use]
pub fn in_memory_deps(session_id: SessionId, fanout: Fanout) -> SubprocessDeps {
    SubprocessDeps {
        session_id,
        fanout,
        permissions: Arc::new(PermissionTable::new()),
        terminals: Arc::new(TerminalManager::new()),
        persistence: Arc::new(KvPersistenceAdapter::new(Arc::new(MemoryKvStore::new()))),
        request_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        create_parent_dirs_on_write: false,
    }
}

fn initialize_reply(id: JsonRpcId) -> Message {
    Message::success(id, serde_json::json!({"protocolVersion": 1, "agentCapabilities": {}}))
}

fn new_session_reply(id: JsonRpcId) -> Message {
    Message::success(id, serde_json::json!({"sessionId": "backend-session-1"}))
}

/// Runs the `initialize` / `session/new` handshake, then on every
/// `session/prompt` sends one `session/update` carrying an
/// `agent_message_chunk` before answering with `stopReason: "end_turn"`
/// — the happy-path scenario (spec §8 scenario 1).
pub fn spawn_happy_path_backend(backend_side: tokio::io::DuplexStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(backend_side);
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(msg) = serde_json::from_str::<Message>(&line) else { continue };
            let reply = match msg.method.as_deref() {
                Some("initialize") => initialize_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0))),
                Some("session/new") => new_session_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0))),
                Some("session/prompt") => {
                    let update = Message::notification(
                        "session/update",
                        serde_json::json!({
                            "sessionId": "backend-session-1",
                            "update": {"sessionUpdate": "agent_message_chunk", "text": "hi"},
                        }),
                    );
                    if let Ok(line) = serialize_message(&update, DEFAULT_MAX_MESSAGE_SIZE) {
                        if write_half.write_all(line.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    Message::success(msg.id.clone().unwrap_or(JsonRpcId::Number(0)), serde_json::json!({"stopReason": "end_turn"}))
                }
                _ => continue,
            };
            let Ok(line) = serialize_message(&reply, DEFAULT_MAX_MESSAGE_SIZE) else { continue };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
    })
}

/// Runs the handshake, then on the first `session/prompt` sends a
/// `session/request_permission` request naming `tool_call_id` (offering
/// `allow_option_id`/`deny_option_id`) instead of replying, and only
/// completes the prompt once the gateway answers that request (via
/// [`brokerd_session::SubprocessSession::resolve_permission`]) — the
/// permission-allow scenario (spec §8 scenario 2).
pub fn spawn_permission_flow_backend(
    backend_side: tokio::io::DuplexStream,
    tool_call_id: impl Into<String>,
    allow_option_id: impl Into<String>,
    deny_option_id: impl Into<String>,
) -> JoinHandle<()> {
    let tool_call_id = tool_call_id.into();
    let allow_option_id = allow_option_id.into();
    let deny_option_id = deny_option_id.into();
    let permission_request_id = JsonRpcId::Number(900_001);
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(backend_side);
        let mut lines = BufReader::new(read_half).lines();
        let mut pending_prompt_id: Option<JsonRpcId> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(msg) = serde_json::from_str::<Message>(&line) else { continue };
            let reply = if msg.id.as_ref() == Some(&permission_request_id) && msg.result.is_some() {
                pending_prompt_id.take().map(|id| Message::success(id, serde_json::json!({"stopReason": "end_turn"})))
            } else {
                match msg.method.as_deref() {
                    Some("initialize") => Some(initialize_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0)))),
                    Some("session/new") => Some(new_session_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0)))),
                    Some("session/prompt") => {
                        pending_prompt_id = msg.id.clone();
                        Some(Message::request(
                            permission_request_id.clone(),
                            "session/request_permission",
                            serde_json::json!({
                                "sessionId": "backend-session-1",
                                "toolCall": {"toolCallId": tool_call_id},
                                "options": [
                                    {"optionId": allow_option_id, "kind": "allow_once"},
                                    {"optionId": deny_option_id, "kind": "reject_once"},
                                ],
                            }),
                        ))
                    }
                    _ => None,
                }
            };
            let Some(reply) = reply else { continue };
            let Ok(line) = serialize_message(&reply, DEFAULT_MAX_MESSAGE_SIZE) else { continue };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
    })
}

/// Runs the handshake normally, then goes silent on the first
/// `session/prompt` and closes the pipe — simulating the child process
/// dying mid-request rather than replying (spec §8 scenario 4). Pair
/// with [`FakeChildController::exit`] so the matching `wait()` call
/// returns the crash's exit status.
pub fn spawn_crashing_backend(backend_side: tokio::io::DuplexStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(backend_side);
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(msg) = serde_json::from_str::<Message>(&line) else { continue };
            let reply = match msg.method.as_deref() {
                Some("initialize") => initialize_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0))),
                Some("session/new") => new_session_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0))),
                Some("session/prompt") => return,
                _ => continue,
            };
            let Ok(line) = serialize_message(&reply, DEFAULT_MAX_MESSAGE_SIZE) else { continue };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
    })
}

/// Runs the handshake, then on `session/prompt` waits for the matching
/// `session/cancel` notification before replying with
/// `stopReason: "cancelled"` rather than ever answering normally — the
/// cancellation scenario (spec §8 scenario 3).
pub fn spawn_cancellable_backend(backend_side: tokio::io::DuplexStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(backend_side);
        let mut lines = BufReader::new(read_half).lines();
        let mut pending_prompt_id: Option<JsonRpcId> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(msg) = serde_json::from_str::<Message>(&line) else { continue };
            let reply = match msg.method.as_deref() {
                Some("initialize") => Some(initialize_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0)))),
                Some("session/new") => Some(new_session_reply(msg.id.clone().unwrap_or(JsonRpcId::Number(0)))),
                Some("session/prompt") => {
                    pending_prompt_id = msg.id.clone();
                    None
                }
                Some("session/cancel") => {
                    pending_prompt_id.take().map(|id| Message::success(id, serde_json::json!({"stopReason": "cancelled"})))
                }
                _ => None,
            };
            let Some(reply) = reply else { continue };
            let Ok(line) = serialize_message(&reply, DEFAULT_MAX_MESSAGE_SIZE) else { continue };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerd_protocol::StopReason;
    use brokerd_session::SubprocessSession;
    use std::path::PathBuf;

    /// Wires a fresh duplex pipe, spawns `spawn_backend` on the backend
    /// side, and connects a [`SubprocessSession`] to the gateway side.
    async fn connect_with<F>(spawn_backend: F) -> (Arc<SubprocessSession>, Arc<FakeChildController>)
    where
        F: FnOnce(tokio::io::DuplexStream) -> JoinHandle<()>,
    {
        let (gateway_side, backend_side) = tokio::io::duplex(16 * 1024);
        spawn_backend(backend_side);
        let (stdout, stdin) = tokio::io::split(gateway_side);
        let controller = FakeChildController::new();
        let session = SubprocessSession::connect::<_, _, tokio::io::DuplexStream>(
            Box::pin(stdin),
            stdout,
            None,
            controller.clone(),
            PathBuf::from("/tmp"),
            vec![],
            in_memory_deps(SessionId::new(), Fanout::new()),
        )
        .await
        .unwrap();
        (Arc::new(session), controller)
    }

    #[tokio::test]
    async fn happy_path_backend_completes_a_prompt() {
        let (session, _controller) = connect_with(spawn_happy_path_backend).await;
        let stop_reason = session.send_prompt("hello").await.unwrap();
        assert_eq!(stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn permission_flow_backend_completes_the_prompt_once_resolved() {
        let (session, _controller) = connect_with(|side| spawn_permission_flow_backend(side, "tool-1", "allow", "deny")).await;

        let (_token, mut events) = session.fanout().subscribe(16).await;
        let prompt = {
            let session = session.clone();
            tokio::spawn(async move { session.send_prompt("hello").await })
        };

        let tool_call_id = loop {
            match events.recv().await.unwrap() {
                brokerd_events::SessionEvent::PermissionRequest { tool_call_id, .. } => break tool_call_id,
                _ => continue,
            }
        };
        assert_eq!(tool_call_id, "tool-1");

        session.resolve_permission(&tool_call_id, Some("allow".to_string()), None).await.unwrap();
        let stop_reason = prompt.await.unwrap().unwrap();
        assert_eq!(stop_reason, StopReason::EndTurn);
    }

    #[tokio::test]
    async fn crashing_backend_fails_the_pending_prompt() {
        let (session, controller) = connect_with(spawn_crashing_backend).await;
        let prompt = {
            let session = session.clone();
            tokio::spawn(async move { session.send_prompt("hello").await })
        };
        controller.exit(ExitStatus { exit_code: -1, signal: Some(9) }).await;
        assert!(prompt.await.unwrap().is_err());
    }
}
