//! Agent Client Protocol (ACP) message shapes exchanged with a subprocess
//! backend (spec §4.2, §6). brokerd adheres to this schema; it does not
//! define it (spec §1 Non-goals).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Protocol version brokerd advertises at `initialize`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Reserved JSON-RPC id for the `initialize` handshake request.
pub const INITIALIZE_ID: i64 = 1;
/// Reserved JSON-RPC id for the `session/new` handshake request.
pub const NEW_SESSION_ID: i64 = 2;
/// First id available to ordinary outbound requests after the handshake.
pub const FIRST_ORDINARY_ID: i64 = 3;

/// `initialize` request params: the capabilities brokerd offers as the
/// ACP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Protocol version this gateway speaks.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    /// Capabilities the gateway exposes to the backend.
    #[serde(rename = "clientCapabilities")]
    pub client_capabilities: ClientCapabilities,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            client_capabilities: ClientCapabilities::default(),
        }
    }
}

/// Capabilities the gateway advertises as the ACP client (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Filesystem capabilities.
    pub fs: FileSystemCapabilities,
    /// Whether managed terminals are available.
    pub terminal: bool,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self { fs: FileSystemCapabilities::default(), terminal: true }
    }
}

/// Filesystem sub-capabilities (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemCapabilities {
    /// `fs/read_text_file` is served.
    #[serde(rename = "readTextFile")]
    pub read_text_file: bool,
    /// `fs/write_text_file` is served.
    #[serde(rename = "writeTextFile")]
    pub write_text_file: bool,
}

impl Default for FileSystemCapabilities {
    fn default() -> Self {
        Self { read_text_file: true, write_text_file: true }
    }
}

/// Result of `initialize`: the backend's own declared capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the backend agreed to.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
    /// Capabilities the backend declares (opaque to brokerd beyond storage).
    #[serde(rename = "agentCapabilities", default)]
    pub agent_capabilities: serde_json::Value,
}

/// `session/new` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionParams {
    /// Working directory the agent should operate in.
    pub cwd: PathBuf,
    /// MCP servers to make available to the agent, opaque to brokerd.
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: Vec<serde_json::Value>,
}

/// Result of `session/new`: the backend's own session identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionResult {
    /// Backend-assigned session id (spec §3: may differ from brokerd's
    /// client-visible id and may be absent, in which case brokerd's own
    /// id is used as the fallback).
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// `session/prompt` params: a sequence of content blocks, usually one
/// text block but open-ended per the ACP schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    /// Backend session id this prompt targets.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Content blocks (opaque beyond the `type`/`text` shape brokerd fills
    /// in for plain text prompts).
    pub prompt: Vec<serde_json::Value>,
}

impl PromptParams {
    /// Build params for a single plain-text prompt.
    #[must_use]
    pub fn text(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            prompt: vec![serde_json::json!({"type": "text", "text": text.into()})],
        }
    }
}

/// Why a prompt finished (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agent reached a natural end of turn.
    EndTurn,
    /// The model's token budget was exhausted.
    MaxTokens,
    /// The turn-request budget was exhausted.
    MaxTurnRequests,
    /// The agent refused to continue.
    Refusal,
    /// The client cancelled the prompt.
    Cancelled,
}

/// Result of `session/prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResult {
    /// Why the prompt finished.
    #[serde(rename = "stopReason")]
    pub stop_reason: StopReason,
}

/// `session/cancel` notification params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    /// Backend session id.
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// `session/update` notification payload (spec §4.2). The `session_update`
/// tag discriminates the many sub-shapes the backend may send; brokerd
/// forwards the payload to subscribers verbatim and only inspects the tag
/// to fire a typed local event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdateNotification {
    /// Backend session id this update concerns.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// The discriminated update payload, forwarded verbatim.
    pub update: serde_json::Value,
}

impl SessionUpdateNotification {
    /// Read the `sessionUpdate` discriminant tag, if present.
    #[must_use]
    pub fn update_tag(&self) -> Option<&str> {
        self.update.get("sessionUpdate")?.as_str()
    }
}

/// `session/request_permission` request params (backend → gateway).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPermissionParams {
    /// Backend session id.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// The tool call this permission gates.
    #[serde(rename = "toolCall")]
    pub tool_call: serde_json::Value,
    /// Options the client may choose between.
    pub options: Vec<PermissionOption>,
}

/// One selectable option in a permission prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionOption {
    /// Stable identifier the client echoes back in its decision.
    #[serde(rename = "optionId")]
    pub option_id: String,
    /// Coarse kind (`allow_once`, `allow_always`, `reject_once`, ...),
    /// opaque beyond passthrough.
    pub kind: String,
    /// Human-readable label, if the backend supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Outcome of a permission decision, returned as the result of
/// `session/request_permission`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// The client picked an option.
    Selected {
        /// The chosen option id.
        #[serde(rename = "optionId")]
        option_id: String,
        /// Structured answers, for options backed by a form-style tool.
        #[serde(skip_serializing_if = "Option::is_none", rename = "updatedInput")]
        updated_input: Option<serde_json::Value>,
    },
    /// The request was cancelled (client disconnect, session termination,
    /// or an explicit denial with no specific option selected).
    Cancelled,
}

/// The full response body sent back for a `session/request_permission`
/// request: `{"outcome": <PermissionOutcome>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPermissionResult {
    /// The decision outcome.
    pub outcome: PermissionOutcome,
}
