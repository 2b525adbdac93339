//! `SdkSession` (spec §4.3): a session backed by an in-process agent
//! SDK rather than a spawned subprocess.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::instrument;

use brokerd_approval::{PendingPermission, PermissionTable, Resolver, SdkDecision};
use brokerd_audit::SessionEventEntry;
use brokerd_core::{BackendId, SessionId};
use brokerd_events::{Fanout, SessionEvent};
use brokerd_protocol::acp::{PermissionOption, StopReason};
use brokerd_sdk::{
    AccountInfo, ContentBlock, McpServerStatus, PermissionCallback, PermissionCallbackContext,
    SdkClient, SdkMessage, SdkQueryHandle, SdkQueryOptions, SessionResult as SdkSessionResult,
    SupportedCommands, SupportedModels,
};
use brokerd_storage::{PersistenceAdapter, SessionState};

use crate::error::{SessionError, SessionResult};

/// External collaborators an [`SdkSession`] needs.
pub struct SdkDeps {
    /// Client-visible id this session is known by.
    pub session_id: SessionId,
    /// Where to publish subscriber events.
    pub fanout: Fanout,
    /// This session's pending-permission table.
    pub permissions: Arc<PermissionTable>,
    /// Where to persist lifecycle and transcript state.
    pub persistence: Arc<dyn PersistenceAdapter>,
    /// Idle-eviction timeout (spec §5: default 10 min).
    pub idle_timeout: Duration,
}

struct Caches {
    supported_models: Mutex<Option<SupportedModels>>,
    account_info: Mutex<Option<AccountInfo>>,
    mcp_server_status: Mutex<Option<McpServerStatus>>,
    supported_commands: Mutex<Option<SupportedCommands>>,
}

impl Default for Caches {
    fn default() -> Self {
        Self {
            supported_models: Mutex::new(None),
            account_info: Mutex::new(None),
            mcp_server_status: Mutex::new(None),
            supported_commands: Mutex::new(None),
        }
    }
}

struct Inner {
    session_id: SessionId,
    client: Arc<dyn SdkClient>,
    fanout: Fanout,
    permissions: Arc<PermissionTable>,
    persistence: Arc<dyn PersistenceAdapter>,
    state: Mutex<SessionState>,
    backend_id: Mutex<Option<BackendId>>,
    handle: Mutex<Option<Arc<dyn SdkQueryHandle>>>,
    processing: AtomicBool,
    last_activity: Mutex<Instant>,
    caches: Caches,
}

/// A session driven by an in-process agent SDK (spec §4.3).
pub struct SdkSession {
    inner: Arc<Inner>,
    idle_timeout: Duration,
    idle_task: JoinHandle<()>,
}

impl SdkSession {
    /// Construct a session around `client`. Unlike [`crate::subprocess::SubprocessSession`]
    /// there is no handshake: the session is `Ready` immediately and its
    /// backend id is learned from the SDK's first message (spec §4.3).
    pub fn new(client: Arc<dyn SdkClient>, deps: SdkDeps) -> Self {
        let inner = Arc::new(Inner {
            session_id: deps.session_id,
            client,
            fanout: deps.fanout,
            permissions: deps.permissions,
            persistence: deps.persistence,
            state: Mutex::new(SessionState::Ready),
            backend_id: Mutex::new(None),
            handle: Mutex::new(None),
            processing: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            caches: Caches::default(),
        });
        let idle_task = spawn_idle_task(Arc::clone(&inner), deps.idle_timeout);
        Self { inner, idle_timeout: deps.idle_timeout, idle_task }
    }

    /// The client-visible session id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// The backend's own session id, once learned from a message.
    pub async fn backend_id(&self) -> Option<BackendId> {
        self.inner.backend_id.lock().await.clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.inner.state.lock().await
    }

    /// Configured idle timeout.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// The event fan-out subscribers attach to (spec §4.6).
    #[must_use]
    pub fn fanout(&self) -> Fanout {
        self.inner.fanout.clone()
    }

    /// `sendPrompt` (spec §4.3): starts a query, consumes its message
    /// stream to completion, publishing a typed event per message, and
    /// returns the stop reason.
    #[instrument(skip(self, text, options), fields(session_id = %self.inner.session_id))]
    pub async fn send_prompt(&self, text: impl Into<String>, options: SdkQueryOptions) -> SessionResult<StopReason> {
        if self.inner.processing.swap(true, Ordering::SeqCst) {
            return Err(SessionError::PromptAlreadyProcessing);
        }
        self.inner.touch_activity().await;
        *self.inner.state.lock().await = SessionState::Processing;
        self.inner.record_event("state_processing", Value::Null).await;

        let outcome = self.inner.drive_query(text.into(), options).await;

        self.inner.processing.store(false, Ordering::SeqCst);
        if self.inner.state().await != SessionState::Terminated {
            *self.inner.state.lock().await = SessionState::Ready;
            self.inner.record_event("state_ready", Value::Null).await;
        }
        outcome
    }

    /// `cancelPrompt` (spec §4.3): interrupt the live query's handle and
    /// locally cancel any outstanding permission requests.
    pub async fn cancel_prompt(&self) -> SessionResult<()> {
        if let Some(handle) = self.inner.handle.lock().await.clone() {
            handle.interrupt().await?;
        }
        self.inner.permissions.drain_with_denial().await;
        Ok(())
    }

    /// Resolve a pending SDK permission callback (spec §4.7).
    pub async fn resolve_permission(&self, tool_call_id: &str, option_id: Option<String>, answers: Option<Value>) -> SessionResult<()> {
        self.inner.permissions.resolve(tool_call_id, option_id.clone(), answers).await?;
        self.inner
            .record_event("permission_resolved", serde_json::json!({"toolCallId": tool_call_id, "optionId": option_id}))
            .await;
        Ok(())
    }

    /// Cancel a single outstanding permission request.
    pub async fn cancel_permission(&self, tool_call_id: &str) -> SessionResult<()> {
        self.inner.permissions.cancel(tool_call_id).await?;
        self.inner.record_event("permission_cancelled", serde_json::json!({"toolCallId": tool_call_id})).await;
        Ok(())
    }

    /// Supported models (spec §4.3): cached, falls back to
    /// [`SessionError::NoActiveQuery`] if never populated.
    pub async fn supported_models(&self) -> SessionResult<SupportedModels> {
        self.inner.fetch_cached(&self.inner.caches.supported_models, |h| Box::pin(h.supported_models())).await
    }

    /// Account info (spec §4.3): cached, same fallback as [`Self::supported_models`].
    pub async fn account_info(&self) -> SessionResult<AccountInfo> {
        self.inner.fetch_cached(&self.inner.caches.account_info, |h| Box::pin(h.account_info())).await
    }

    /// MCP server status (spec §4.3): cached, same fallback.
    pub async fn mcp_server_status(&self) -> SessionResult<McpServerStatus> {
        self.inner.fetch_cached(&self.inner.caches.mcp_server_status, |h| Box::pin(h.mcp_server_status())).await
    }

    /// Supported commands (spec §4.3): cached, same fallback.
    pub async fn supported_commands(&self) -> SessionResult<SupportedCommands> {
        self.inner.fetch_cached(&self.inner.caches.supported_commands, |h| Box::pin(h.supported_commands())).await
    }

    /// Mutate the live query's permission mode, if one is running.
    pub async fn set_permission_mode(&self, mode: &str) -> SessionResult<()> {
        let mode = mode.to_string();
        self.inner.with_live_handle(|h| Box::pin(async move { h.set_permission_mode(&mode).await })).await
    }

    /// Mutate the live query's model, if one is running.
    pub async fn set_model(&self, model: &str) -> SessionResult<()> {
        let model = model.to_string();
        self.inner.with_live_handle(|h| Box::pin(async move { h.set_model(&model).await })).await
    }

    /// Mutate the live query's thinking-token budget, if one is running.
    pub async fn set_max_thinking_tokens(&self, tokens: u32) -> SessionResult<()> {
        self.inner.with_live_handle(|h| Box::pin(async move { h.set_max_thinking_tokens(tokens).await })).await
    }

    /// Replace the live query's MCP server configuration, if one is running.
    pub async fn set_mcp_servers(&self, servers: Value) -> SessionResult<()> {
        self.inner.with_live_handle(|h| Box::pin(async move { h.set_mcp_servers(servers).await })).await
    }

    /// Roll the live query's file checkpoints back, if one is running.
    pub async fn rewind_files(&self, checkpoint: &str) -> SessionResult<()> {
        let checkpoint = checkpoint.to_string();
        self.inner.with_live_handle(|h| Box::pin(async move { h.rewind_files(&checkpoint).await })).await
    }

    /// `terminate` (spec §4.3): interrupt any live query, reject pending
    /// permission requests, and mark the session terminated.
    #[instrument(skip(self), fields(session_id = %self.inner.session_id))]
    pub async fn terminate(&self) -> SessionResult<()> {
        let _ = self.cancel_prompt().await;
        *self.inner.state.lock().await = SessionState::Terminated;
        self.idle_task.abort();
        self.inner.record_event("state_terminated", Value::Null).await;
        self.inner.fanout.publish(SessionEvent::Exit { session_id: self.inner.session_id, code: None, signal: None });
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
    /// propagated.
    async fn record_event(&self, event_type: &str, payload: Value) {
        let entry = SessionEventEntry::new(self.session_id, event_type, payload);
        if let Err(err) = self.persistence.append_session_event(entry).await {
            tracing::warn!(session_id = %self.session_id, %err, "failed to append session event");
        }
    }

    async fn fetch_cached<T, F>(&self, cache: &Mutex<Option<T>>, fetch: F) -> SessionResult<T>
    where
        T: Clone,
        F: for<'a> FnOnce(&'a Arc<dyn SdkQueryHandle>) -> std::pin::Pin<Box<dyn std::future::Future<Output = brokerd_sdk::SdkResult<T>> + Send + 'a>>,
    {
        if let Some(handle) = self.handle.lock().await.clone() {
            let value = fetch(&handle).await?;
            *cache.lock().await = Some(value.clone());
            return Ok(value);
        }
        cache.lock().await.clone().ok_or(SessionError::NoActiveQuery)
    }

    async fn with_live_handle<F>(&self, f: F) -> SessionResult<()>
    where
        F: for<'a> FnOnce(&'a Arc<dyn SdkQueryHandle>) -> std::pin::Pin<Box<dyn std::future::Future<Output = brokerd_sdk::SdkResult<()>> + Send + 'a>>,
    {
        let handle = self.handle.lock().await.clone().ok_or(SessionError::NoActiveQuery)?;
        f(&handle).await.map_err(SessionError::from)
    }

    async fn populate_caches(&self, handle: Arc<dyn SdkQueryHandle>) {
        if let Ok(v) = handle.supported_models().await {
            *self.caches.supported_models.lock().await = Some(v);
        }
        if let Ok(v) = handle.account_info().await {
            *self.caches.account_info.lock().await = Some(v);
        }
        if let Ok(v) = handle.mcp_server_status().await {
            *self.caches.mcp_server_status.lock().await = Some(v);
        }
        if let Ok(v) = handle.supported_commands().await {
            *self.caches.supported_commands.lock().await = Some(v);
        }
    }

    async fn drive_query(self: &Arc<Self>, text: String, options: SdkQueryOptions) -> SessionResult<StopReason> {
        let callback = make_permission_callback(Arc::clone(self));
        let mut query = self.client.query(text, options, callback).await?;
        *self.handle.lock().await = Some(Arc::clone(&query.handle));

        let populate_handle = Arc::clone(&query.handle);
        let populate_inner = Arc::clone(self);
        tokio::spawn(async move { populate_inner.populate_caches(populate_handle).await });

        let mut last_stop_reason: Option<StopReason> = None;
        let mut result_was_error = false;
        let mut saw_result = false;

        while let Some(item) = query.messages.next().await {
            match item {
                Ok(message) => {
                    self.touch_activity().await;
                    self.handle_sdk_message(message, &mut last_stop_reason, &mut result_was_error, &mut saw_result).await;
                }
                Err(err) => {
                    self.record_event("backend_error", serde_json::json!({"message": err.to_string()})).await;
                    self.fanout.publish(SessionEvent::Error { session_id: self.session_id, message: err.to_string() });
                    *self.handle.lock().await = None;
                    return Err(SessionError::from(err));
                }
            }
        }

        *self.handle.lock().await = None;
        let stop_reason = last_stop_reason.unwrap_or(if saw_result && result_was_error { StopReason::Refusal } else { StopReason::EndTurn });
        self.fanout.publish(SessionEvent::PromptComplete {
            session_id: self.session_id,
            payload: serde_json::json!({"stopReason": stop_reason}),
        });
        Ok(stop_reason)
    }

    async fn handle_sdk_message(
        self: &Arc<Self>,
        message: SdkMessage,
        last_stop_reason: &mut Option<StopReason>,
        result_was_error: &mut bool,
        saw_result: &mut bool,
    ) {
        match &message {
            SdkMessage::System { session_id, .. }
            | SdkMessage::Assistant { session_id, .. }
            | SdkMessage::StreamEvent { session_id, .. }
            | SdkMessage::User { session_id, .. }
            | SdkMessage::Result { session_id, .. } => {
                if let Some(backend_id) = session_id {
                    self.adopt_backend_id(backend_id.clone()).await;
                }
            }
            SdkMessage::Unrecognised(_) => {}
        }

        match message {
            SdkMessage::Assistant { content, stop_reason, usage, session_id } => {
                if let Some(reason) = stop_reason.as_deref() {
                    *last_stop_reason = parse_stop_reason(reason);
                }
                for block in &content {
                    self.publish_content_block(block);
                }
                let aggregate = SdkMessage::Assistant { content, stop_reason, usage, session_id };
                self.publish_message(&aggregate);
            }
            SdkMessage::Result { result, .. } => {
                *saw_result = true;
                *result_was_error = result.is_error;
                self.publish_result(&result);
            }
            other => self.publish_message(&other),
        }
    }

    /// Emit one typed event per content block (spec §4.3: "text" → text
    /// chunk, "tool_use" → tool-call event, "thinking" → thinking
    /// event), ahead of the aggregate completion event for the message
    /// that carried them.
    fn publish_content_block(&self, block: &ContentBlock) {
        let payload = match block {
            ContentBlock::Text { text } => serde_json::json!({"type": "text", "text": text}),
            ContentBlock::ToolUse { id, name, input } => {
                serde_json::json!({"type": "tool_use", "tool_call": {"id": id, "name": name, "input": input}})
            }
            ContentBlock::Thinking { thinking } => serde_json::json!({"type": "thinking", "thinking": thinking}),
            ContentBlock::Other => return,
        };
        self.fanout.publish(SessionEvent::Message { session_id: self.session_id, payload });
    }

    fn publish_message(&self, message: &SdkMessage) {
        let payload = sdk_message_to_json(message);
        self.fanout.publish(SessionEvent::Message { session_id: self.session_id, payload });
    }

    fn publish_result(&self, result: &SdkSessionResult) {
        let payload = serde_json::to_value(result).unwrap_or(Value::Null);
        self.fanout.publish(SessionEvent::Message { session_id: self.session_id, payload });
    }

    async fn adopt_backend_id(&self, raw_id: String) {
        let mut current = self.backend_id.lock().await;
        if current.as_ref().map(BackendId::as_str) != Some(raw_id.as_str()) {
            let backend_id = BackendId::new(raw_id);
            *current = Some(backend_id.clone());
            drop(current);
            let _ = self.persistence.update_backend_id(self.session_id, backend_id, Value::Null).await;
        }
    }

    async fn on_idle(&self) {
        if self.state().await == SessionState::Terminated {
            return;
        }
        self.fanout.publish(SessionEvent::Idle { session_id: self.session_id });
    }
}

fn parse_stop_reason(raw: &str) -> Option<StopReason> {
    serde_json::from_value(Value::String(raw.to_string())).ok()
}

fn sdk_message_to_json(message: &SdkMessage) -> Value {
    match message {
        SdkMessage::System { subtype, fields, .. } => serde_json::json!({"type": "system", "subtype": subtype, "fields": fields}),
        SdkMessage::Assistant { content, stop_reason, usage, .. } => {
            serde_json::json!({"type": "assistant", "content": content, "stopReason": stop_reason, "usage": usage})
        }
        SdkMessage::StreamEvent { event, .. } => serde_json::json!({"type": "stream_event", "event": event}),
        SdkMessage::User { content, .. } => serde_json::json!({"type": "user", "content": content}),
        SdkMessage::Result { result, .. } => serde_json::to_value(result).unwrap_or(Value::Null),
        SdkMessage::Unrecognised(raw) => raw.clone(),
    }
}

fn default_permission_options(suggestions: &[brokerd_sdk::PermissionSuggestion]) -> Vec<PermissionOption> {
    let mut options: Vec<PermissionOption> = suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| PermissionOption {
            option_id: format!("suggestion_{i}"),
            kind: s.kind.clone(),
            label: s.destination.clone().or_else(|| s.behavior.clone()),
        })
        .collect();
    options.push(PermissionOption { option_id: "allow_once".into(), kind: "allow_once".into(), label: Some("Allow".into()) });
    options.push(PermissionOption { option_id: "allow_always".into(), kind: "allow_always".into(), label: Some("Always Allow".into()) });
    options.push(PermissionOption { option_id: "reject_once".into(), kind: "reject_once".into(), label: Some("Deny".into()) });
    options
}

fn make_permission_callback(inner: Arc<Inner>) -> PermissionCallback {
    Arc::new(move |tool_name: String, input: Value, context: PermissionCallbackContext| {
        let inner = Arc::clone(&inner);
        Box::pin(async move {
            let tool_call_id = context.tool_use_id.clone();
            let options = default_permission_options(&context.suggestions);

            let mut context_value = serde_json::to_value(&context).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = context_value {
                map.insert("toolName".to_string(), Value::String(tool_name));
                map.insert("input".to_string(), input);
            }

            let (reply_tx, reply_rx) = oneshot::channel();
            inner
                .permissions
                .register(
                    tool_call_id.clone(),
                    PendingPermission { options: options.clone(), context: context_value.clone(), resolver: Resolver::Sdk { reply: Some(reply_tx) } },
                )
                .await;
            inner.fanout.publish(SessionEvent::PermissionRequest {
                session_id: inner.session_id,
                tool_call_id: tool_call_id.clone(),
                options: options.into_iter().map(|o| serde_json::to_value(o).unwrap_or(Value::Null)).collect(),
                context: context_value,
            });

            match reply_rx.await {
                Ok(decision) => decision,
                Err(_) => SdkDecision::Deny { tool_use_id: tool_call_id, message: "permission channel closed".into(), interrupt: true },
            }
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brokerd_sdk::{SdkError, SdkMessageStream, SdkQuery, SdkResult};
    use brokerd_storage::{KvPersistenceAdapter, MemoryKvStore};
    use futures::stream;

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
        async fn supported_models(&self) -> SdkResult<SupportedModels> {
            Ok(SupportedModels { models: vec!["model-x".into()] })
        }
        async fn account_info(&self) -> SdkResult<AccountInfo> {
            Ok(AccountInfo::default())
        }
        async fn mcp_server_status(&self) -> SdkResult<McpServerStatus> {
            Ok(McpServerStatus::default())
        }
        async fn supported_commands(&self) -> SdkResult<SupportedCommands> {
            Ok(SupportedCommands::default())
        }
    }

    struct ScriptedClient {
        messages: Vec<Value>,
    }

    #[async_trait]
    impl SdkClient for ScriptedClient {
        async fn query(&self, _prompt: String, _options: SdkQueryOptions, _on_permission_request: PermissionCallback) -> SdkResult<SdkQuery> {
            let items: Vec<SdkResult<SdkMessage>> = self.messages.iter().cloned().map(|raw| Ok(SdkMessage::classify(raw))).collect();
            let messages: SdkMessageStream = Box::pin(stream::iter(items));
            Ok(SdkQuery { messages, handle: Arc::new(StubHandle) })
        }
    }

    fn deps(session_id: SessionId) -> SdkDeps {
        SdkDeps {
            session_id,
            fanout: Fanout::new(),
            permissions: Arc::new(PermissionTable::new()),
            persistence: Arc::new(KvPersistenceAdapter::new(Arc::new(MemoryKvStore::new()))),
            idle_timeout: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn a_completed_query_reports_its_stop_reason_and_adopts_the_backend_id() {
        let client = Arc::new(ScriptedClient {
            messages: vec![
                serde_json::json!({"type": "system", "subtype": "init", "session_id": "sdk-session-1"}),
                serde_json::json!({"type": "assistant", "content": [{"type": "text", "text": "hi"}], "stop_reason": "end_turn", "session_id": "sdk-session-1"}),
            ],
        });
        let session = SdkSession::new(client, deps(SessionId::new()));
        let stop_reason = session.send_prompt("hello", SdkQueryOptions::new()).await.unwrap();
        assert_eq!(stop_reason, StopReason::EndTurn);
        assert_eq!(session.backend_id().await.unwrap().as_str(), "sdk-session-1");
    }

    #[tokio::test]
    async fn a_concurrent_prompt_is_rejected() {
        let client = Arc::new(ScriptedClient { messages: vec![serde_json::json!({"type": "result", "result": {}})] });
        let session = Arc::new(SdkSession::new(client, deps(SessionId::new())));
        let a = Arc::clone(&session);
        let first = tokio::spawn(async move { a.send_prompt("slow", SdkQueryOptions::new()).await });
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = session.send_prompt("also", SdkQueryOptions::new()).await;
        let _ = first.await;
        assert!(matches!(second, Err(SessionError::PromptAlreadyProcessing)) || second.is_ok());
    }

    #[tokio::test]
    async fn information_caches_miss_before_any_query_has_run() {
        let client = Arc::new(ScriptedClient { messages: vec![] });
        let session = SdkSession::new(client, deps(SessionId::new()));
        let err = session.supported_models().await.unwrap_err();
        assert!(matches!(err, SessionError::NoActiveQuery));
    }

    #[test]
    fn sdk_error_converts_into_session_error() {
        let err: SessionError = SdkError::NoActiveQuery.into();
        assert!(matches!(err, SessionError::Sdk(_)));
    }

    #[tokio::test]
    async fn an_assistant_message_is_decomposed_into_one_event_per_content_block() {
        let client = Arc::new(ScriptedClient {
            messages: vec![serde_json::json!({
                "type": "assistant",
                "content": [
                    {"type": "text", "text": "thinking about it"},
                    {"type": "tool_use", "id": "call-1", "name": "bash", "input": {"cmd": "ls"}},
                ],
                "stop_reason": "end_turn",
            })],
        });
        let session = SdkSession::new(client, deps(SessionId::new()));
        let (_token, mut receiver) = session.fanout().subscribe(16).await;
        session.send_prompt("hello", SdkQueryOptions::new()).await.unwrap();

        let mut payloads = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let SessionEvent::Message { payload, .. } = event {
                payloads.push(payload);
            }
        }

        assert!(payloads.iter().any(|p| p["type"] == "text" && p["text"] == "thinking about it"));
        assert!(payloads.iter().any(|p| p["type"] == "tool_use" && p["tool_call"]["name"] == "bash"));
        assert!(payloads.iter().any(|p| p["type"] == "assistant"), "expected an aggregate assistant event");
    }
}
