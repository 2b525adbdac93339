//! Fake implementations of brokerd's external-collaborator traits.
//!
//! Each of these mirrors a fake already living in the crate that owns
//! the trait (`brokerd-session`'s own test modules); promoted here so
//! `brokerd-gateway` and `brokerd-integration-tests` don't each grow a
//! slightly different copy.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use brokerd_crypto::Envelope;
use brokerd_sdk::{
    AccountInfo, McpServerStatus, PermissionCallback, SdkClient, SdkError, SdkMessage,
    SdkMessageStream, SdkQuery, SdkQueryHandle, SdkQueryOptions, SdkResult, SupportedCommands,
    SupportedModels,
};
use brokerd_session::{CredentialStore, SessionError, SessionResult};
use brokerd_workspace::{WorkspaceError, WorkspaceResult, WorktreeManager};

/// A [`CredentialStore`] with nothing in it; every lookup fails.
pub struct NoopCredentialStore;

#[async_trait]
impl CredentialStore for NoopCredentialStore {
    async fn load_envelope(&self, credential_id: &str) -> SessionResult<Envelope> {
        Err(SessionError::Internal(format!("no credential store configured for {credential_id}")))
    }
}

/// A [`WorktreeManager`] that always resolves to the process's temp
/// directory, regardless of `workspace_id`.
pub struct AlwaysCwdWorktreeManager;

#[async_trait]
impl WorktreeManager for AlwaysCwdWorktreeManager {
    async fn prepare(&self, _workspace_id: &str) -> WorkspaceResult<PathBuf> {
        Ok(std::env::temp_dir())
    }
}

/// A [`WorktreeManager`] that fails for one named workspace id and
/// succeeds (with the temp directory) for every other.
pub struct FailingWorktreeManager {
    fail_for: String,
}

impl FailingWorktreeManager {
    /// Fail `prepare` only when called with `workspace_id`.
    #[must_use]
    pub fn failing_for(workspace_id: impl Into<String>) -> Self {
        Self { fail_for: workspace_id.into() }
    }
}

#[async_trait]
impl WorktreeManager for FailingWorktreeManager {
    async fn prepare(&self, workspace_id: &str) -> WorkspaceResult<PathBuf> {
        if workspace_id == self.fail_for {
            return Err(WorkspaceError::WorktreePreparationFailed {
                workspace_id: workspace_id.to_string(),
                reason: "simulated failure".to_string(),
            });
        }
        Ok(std::env::temp_dir())
    }
}

/// A no-op [`SdkQueryHandle`]; every control call succeeds and every
/// information call returns a default value.
pub struct StubQueryHandle;

#[async_trait]
impl SdkQueryHandle for StubQueryHandle {
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
    async fn set_mcp_servers(&self, _servers: serde_json::Value) -> SdkResult<()> {
        Ok(())
    }
    async fn rewind_files(&self, _checkpoint: &str) -> SdkResult<()> {
        Ok(())
    }
    async fn supported_models(&self) -> SdkResult<SupportedModels> {
        Ok(SupportedModels::default())
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

/// An [`SdkClient`] that replays a fixed, scripted sequence of raw SDK
/// messages on every `query` call, then hands back a [`StubQueryHandle`].
///
/// Queue whatever `{"type": ...}` JSON values the scenario under test
/// needs classified; defaults to a single bare `result` message if the
/// queue is empty, matching the common "query completes immediately"
/// case.
pub struct ScriptedSdkClient {
    messages: Vec<serde_json::Value>,
    calls: AtomicBool,
    last_options: Mutex<Option<SdkQueryOptions>>,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedSdkClient {
    /// A client whose query stream is exactly `messages`, classified in
    /// order.
    #[must_use]
    pub fn new(messages: Vec<serde_json::Value>) -> Self {
        Self { messages, calls: AtomicBool::new(false), last_options: Mutex::new(None), last_prompt: Mutex::new(None) }
    }

    /// Whether `query` has been called at least once.
    #[must_use]
    pub fn was_queried(&self) -> bool {
        self.calls.load(Ordering::SeqCst)
    }

    /// The options passed to the most recent `query` call, for
    /// asserting a resumed session actually set `resume`/`continue`.
    pub async fn last_options(&self) -> Option<SdkQueryOptions> {
        self.last_options.lock().await.clone()
    }

    /// The prompt text passed to the most recent `query` call.
    pub async fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().await.clone()
    }
}

impl Default for ScriptedSdkClient {
    fn default() -> Self {
        Self::new(vec![serde_json::json!({"type": "result", "result": {}})])
    }
}

#[async_trait]
impl SdkClient for ScriptedSdkClient {
    async fn query(&self, prompt: String, options: SdkQueryOptions, _on_permission_request: PermissionCallback) -> SdkResult<SdkQuery> {
        self.calls.store(true, Ordering::SeqCst);
        *self.last_options.lock().await = Some(options);
        *self.last_prompt.lock().await = Some(prompt);
        let classified: Vec<Result<SdkMessage, SdkError>> =
            self.messages.iter().cloned().map(|raw| Ok(SdkMessage::classify(raw))).collect();
        let messages: SdkMessageStream = Box::pin(stream::iter(classified));
        Ok(SdkQuery { messages, handle: Arc::new(StubQueryHandle) })
    }
}

/// An [`SdkClient`] whose every `query` call fails with
/// [`SdkError::QueryStartFailed`], for exercising spawn-failure paths.
pub struct RefusingSdkClient {
    reason: String,
}

impl RefusingSdkClient {
    /// Fail every query with `reason`.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Default for RefusingSdkClient {
    fn default() -> Self {
        Self::new("sdk client not configured for this test")
    }
}

#[async_trait]
impl SdkClient for RefusingSdkClient {
    async fn query(&self, _prompt: String, _options: SdkQueryOptions, _on_permission_request: PermissionCallback) -> SdkResult<SdkQuery> {
        Err(SdkError::QueryStartFailed(self.reason.clone()))
    }
}

/// A queue of raw SDK messages a test can push into mid-run, for
/// scenarios that need to assert on behaviour *between* messages
/// rather than replay a fixed script. Not wired to [`SdkClient`]
/// directly — intended for driving [`brokerd_session::SdkSession`]'s
/// lower-level message-translation path in isolation.
#[derive(Default)]
pub struct MessageQueue {
    inner: StdMutex<VecDeque<serde_json::Value>>,
}

impl MessageQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a raw message onto the back of the queue.
    pub fn push(&self, message: serde_json::Value) {
        self.inner.lock().expect("message queue lock poisoned").push_back(message);
    }

    /// Pop the oldest raw message, if any.
    pub fn pop(&self) -> Option<serde_json::Value> {
        self.inner.lock().expect("message queue lock poisoned").pop_front()
    }
}

/// A `std::sync::Mutex`-backed counter, for tests that need to assert
/// a collaborator was invoked a specific number of times without
/// reaching for an async mutex.
#[derive(Default)]
pub struct CallCounter {
    count: StdMutex<usize>,
}

impl CallCounter {
    /// A counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new count.
    pub fn increment(&self) -> usize {
        let mut guard = self.count.lock().expect("counter lock poisoned");
        *guard += 1;
        *guard
    }

    /// The current count.
    #[must_use]
    pub fn get(&self) -> usize {
        *self.count.lock().expect("counter lock poisoned")
    }
}

/// Guards a [`tokio::sync::Mutex`]-wrapped value for the handful of
/// tests that want to await a value becoming available without
/// hand-rolling a `Notify`.
pub async fn await_set<T: Clone>(cell: &Mutex<Option<T>>) -> T {
    loop {
        if let Some(value) = cell.lock().await.clone() {
            return value;
        }
        tokio::task::yield_now().await;
    }
}

/// A [`PermissionCallback`] that denies every request, for drivers that
/// need one but whose test doesn't exercise permission mediation.
#[must_use]
pub fn deny_everything_callback() -> PermissionCallback {
    Arc::new(|_tool_name, _input, ctx| {
        Box::pin(async move {
            brokerd_approval::SdkDecision::Deny { tool_use_id: ctx.tool_use_id, message: "denied by test fixture".to_string(), interrupt: false }
        })
    })
}
