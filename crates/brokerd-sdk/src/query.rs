//! The contract an in-process agent SDK must satisfy (spec §4.3).
//!
//! This crate never talks to a real model: the actual SDK is an
//! external collaborator (spec §1's OUT OF SCOPE list implies as much —
//! "does not implement any model inference"). What lives here is the
//! narrow interface `SdkSession` drives: start a query, consume its
//! message stream, and mutate it live through a small capability trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use brokerd_approval::SdkDecision;

use crate::error::SdkResult;
use crate::types::{
    AccountInfo, McpServerStatus, PermissionCallbackContext, SdkMessage, SdkQueryOptions,
    SupportedCommands, SupportedModels,
};

/// A boxed stream of classified SDK messages.
pub type SdkMessageStream = Pin<Box<dyn Stream<Item = SdkResult<SdkMessage>> + Send>>;

/// The callback the session hands to `SDK.query` so the SDK can ask for
/// tool-use approval mid-query. Resolves to the decision the client (or
/// a locally-synthesized denial) produced.
pub type PermissionCallback = Arc<
    dyn Fn(String, Value, PermissionCallbackContext) -> Pin<Box<dyn Future<Output = SdkDecision> + Send>>
        + Send
        + Sync,
>;

/// Live control surface for a started query (spec §4.3: "interrupt,
/// setMode, setModel, setMaxThinkingTokens, set-mcp-servers, rewindFiles,
/// supportedModels, accountInfo, mcpServerStatus, supportedCommands").
#[async_trait]
pub trait SdkQueryHandle: Send + Sync {
    /// Abort the in-flight query.
    async fn interrupt(&self) -> SdkResult<()>;

    /// Change the live permission mode.
    async fn set_permission_mode(&self, mode: &str) -> SdkResult<()>;

    /// Change the live model.
    async fn set_model(&self, model: &str) -> SdkResult<()>;

    /// Change the live thinking-token budget.
    async fn set_max_thinking_tokens(&self, tokens: u32) -> SdkResult<()>;

    /// Replace the live MCP server configuration.
    async fn set_mcp_servers(&self, servers: Value) -> SdkResult<()>;

    /// Roll file-system checkpoints back to a prior point.
    async fn rewind_files(&self, checkpoint: &str) -> SdkResult<()>;

    /// Fetch the currently supported models.
    async fn supported_models(&self) -> SdkResult<SupportedModels>;

    /// Fetch account information.
    async fn account_info(&self) -> SdkResult<AccountInfo>;

    /// Fetch MCP server connection status.
    async fn mcp_server_status(&self) -> SdkResult<McpServerStatus>;

    /// Fetch the currently supported slash commands.
    async fn supported_commands(&self) -> SdkResult<SupportedCommands>;
}

/// A started query: its message stream plus the handle used to mutate
/// or inspect it while live.
pub struct SdkQuery {
    /// The classified message stream, consumed in arrival order.
    pub messages: SdkMessageStream,
    /// The live control handle.
    pub handle: Arc<dyn SdkQueryHandle>,
}

impl std::fmt::Debug for SdkQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkQuery").finish_non_exhaustive()
    }
}

/// What `SdkSession` drives to start a query (spec §4.3's
/// `SDK.query(prompt, options)`).
#[async_trait]
pub trait SdkClient: Send + Sync {
    /// Start a new query. `on_permission_request` is invoked whenever
    /// the SDK needs the client to approve a tool call; its resolution
    /// becomes the callback's return value inside the SDK.
    async fn query(
        &self,
        prompt: String,
        options: SdkQueryOptions,
        on_permission_request: PermissionCallback,
    ) -> SdkResult<SdkQuery>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
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

    struct StubClient;

    #[async_trait]
    impl SdkClient for StubClient {
        async fn query(
            &self,
            _prompt: String,
            _options: SdkQueryOptions,
            _on_permission_request: PermissionCallback,
        ) -> SdkResult<SdkQuery> {
            let messages = stream::iter(vec![Ok(SdkMessage::classify(serde_json::json!({
                "type": "system",
                "subtype": "init",
            })))]);
            Ok(SdkQuery { messages: Box::pin(messages), handle: Arc::new(StubHandle) })
        }
    }

    #[tokio::test]
    async fn a_stub_client_can_be_driven_through_the_trait_object() {
        use futures::StreamExt;

        let client: Arc<dyn SdkClient> = Arc::new(StubClient);
        let callback: PermissionCallback = Arc::new(|_tool, _input, _ctx| {
            Box::pin(async { SdkDecision::Deny { tool_use_id: "x".into(), message: "no".into(), interrupt: false } })
        });
        let mut query = client.query("hi".into(), SdkQueryOptions::new(), callback).await.unwrap();

        let first = query.messages.next().await.unwrap().unwrap();
        assert!(matches!(first, SdkMessage::System { .. }));

        query.handle.interrupt().await.unwrap();
    }

    #[test]
    fn error_display_matches_spec_wording() {
        assert_eq!(SdkError::PromptAlreadyProcessing.to_string(), "prompt already processing");
    }
}
