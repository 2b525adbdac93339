//! Message and configuration shapes exchanged with an in-process agent
//! SDK (spec §4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Snapshot of configuration passed to `SDK.query(prompt, options)`
/// (spec §9's "Enumerated SDK configuration fields").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdkQueryOptions {
    /// The permission-decision mode the SDK should start in.
    pub permission_mode: Option<String>,
    /// Tool names explicitly allowed.
    pub allowed_tools: Vec<String>,
    /// Tool names explicitly disallowed.
    pub disallowed_tools: Vec<String>,
    /// Maximum number of conversational turns before the query stops
    /// itself with `stopReason: max_turn_requests`.
    pub max_turns: Option<u32>,
    /// Spending cap in US dollars.
    pub max_budget_usd: Option<f64>,
    /// Maximum thinking-token budget.
    pub max_thinking_tokens: Option<u32>,
    /// Requested model identifier.
    pub model: Option<String>,
    /// Model to fall back to if the primary is unavailable.
    pub fallback_model: Option<String>,
    /// MCP server configuration blocks, keyed by server name.
    pub mcp_servers: HashMap<String, Value>,
    /// Subagent definitions available to this query.
    pub agents: Vec<Value>,
    /// Sandbox configuration block, opaque to the gateway.
    pub sandbox: Option<Value>,
    /// Plugin configuration block, opaque to the gateway.
    pub plugins: Vec<Value>,
    /// Requested output format (e.g. "text", "json").
    pub output_format: Option<String>,
    /// System prompt override.
    pub system_prompt: Option<String>,
    /// Extra directories the agent may read/write beyond the working
    /// directory.
    pub additional_directories: Vec<String>,
    /// Backend session id to resume.
    pub resume: Option<String>,
    /// Whether to continue the most recent conversation for `resume`.
    #[serde(rename = "continue")]
    pub continue_: bool,
    /// Whether this query forks into a new session rather than
    /// continuing in place.
    pub fork_session: bool,
    /// Whether the SDK should persist this session itself.
    pub persist_session: bool,
    /// Whether file checkpointing is enabled for `rewindFiles`.
    pub enable_file_checkpointing: bool,
}

impl SdkQueryOptions {
    /// Build the default, bare options (no resume, no restrictions).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model to resume from a prior backend session id.
    #[must_use]
    pub fn with_resume(mut self, backend_id: impl Into<String>) -> Self {
        self.resume = Some(backend_id.into());
        self.continue_ = true;
        self
    }

    /// Override the requested model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A single content block within an `assistant` or `user` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation the agent is requesting.
    ToolUse {
        /// The SDK's tool-call identifier.
        id: String,
        /// The tool's name.
        name: String,
        /// The tool's input, shaped however the tool defines it.
        input: Value,
    },
    /// A chain-of-thought / reasoning block.
    Thinking {
        /// The thinking text.
        thinking: String,
    },
    /// Anything the gateway doesn't specifically model.
    #[serde(other)]
    Other,
}

/// A `stream_event` message's inner event (spec: "content_block_start |
/// delta | stop").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKind {
    /// A new content block has started at `index`.
    ContentBlockStart {
        /// The block's position in the message.
        index: u32,
        /// The block's declared kind, if already known.
        content_block: Option<Value>,
    },
    /// A delta was appended to the block at `index`.
    ContentBlockDelta {
        /// The block's position in the message.
        index: u32,
        /// The delta payload (text, json-partial, or thinking).
        delta: Value,
    },
    /// The block at `index` is complete.
    ContentBlockStop {
        /// The block's position in the message.
        index: u32,
    },
    /// Anything not one of the three recognised stream-event kinds.
    #[serde(other)]
    Other,
}

/// The `result` message's aggregate payload (spec: "numTurns, duration,
/// cost, per-model usage, permission denials, structured output").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionResult {
    /// Whether the query completed successfully.
    pub is_error: bool,
    /// Number of conversational turns taken.
    pub num_turns: u32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Total cost in US dollars.
    pub total_cost_usd: Option<f64>,
    /// Usage broken down per model identifier.
    pub usage_by_model: HashMap<String, Value>,
    /// Count of permission requests that were denied.
    pub permission_denials: u32,
    /// Structured output, if the query requested one.
    pub structured_output: Option<Value>,
}

/// A classified SDK message (spec §4.3's message-translation table).
#[derive(Debug, Clone)]
pub enum SdkMessage {
    /// `system` message, any subtype (`init`, `status`, `hook_*`,
    /// `task_*`, `compact_boundary`).
    System {
        /// The subtype discriminator.
        subtype: String,
        /// The subtype-specific fields, verbatim.
        fields: Value,
        /// A `session_id` field, if present on this message.
        session_id: Option<String>,
    },
    /// `assistant` message carrying content blocks plus the final stop
    /// reason and usage once complete.
    Assistant {
        /// The message's content blocks, in order.
        content: Vec<ContentBlock>,
        /// Present once the turn has finished.
        stop_reason: Option<String>,
        /// Token/usage accounting, if reported.
        usage: Option<Value>,
        /// A `session_id` field, if present on this message.
        session_id: Option<String>,
    },
    /// `stream_event` message.
    StreamEvent {
        /// The inner event.
        event: StreamEventKind,
        /// A `session_id` field, if present on this message.
        session_id: Option<String>,
    },
    /// `user` message (echoed back by the SDK).
    User {
        /// The message content, verbatim.
        content: Value,
        /// A `session_id` field, if present on this message.
        session_id: Option<String>,
    },
    /// `result` message.
    Result {
        /// The aggregate result.
        result: SessionResult,
        /// A `session_id` field, if present on this message.
        session_id: Option<String>,
    },
    /// Anything the gateway doesn't recognise, forwarded verbatim.
    Unrecognised(Value),
}

impl SdkMessage {
    /// Classify a raw SDK message by its `type` discriminator field.
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        let session_id = raw.get("session_id").and_then(Value::as_str).map(str::to_owned);
        match raw.get("type").and_then(Value::as_str) {
            Some("system") => {
                let subtype = raw.get("subtype").and_then(Value::as_str).unwrap_or("unknown").to_owned();
                Self::System { subtype, fields: raw, session_id }
            }
            Some("assistant") => {
                let content: Vec<ContentBlock> = raw
                    .get("content")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                let stop_reason = raw.get("stop_reason").and_then(Value::as_str).map(str::to_owned);
                let usage = raw.get("usage").cloned();
                Self::Assistant { content, stop_reason, usage, session_id }
            }
            Some("stream_event") => {
                let event = raw
                    .get("event")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or(StreamEventKind::Other);
                Self::StreamEvent { event, session_id }
            }
            Some("user") => {
                let content = raw.get("content").cloned().unwrap_or(Value::Null);
                Self::User { content, session_id }
            }
            Some("result") => {
                let result = raw
                    .get("result")
                    .or(Some(&raw))
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default();
                Self::Result { result, session_id }
            }
            other => {
                tracing::debug!(message_type = ?other, "forwarding unrecognised SDK message verbatim");
                Self::Unrecognised(raw)
            }
        }
    }
}

/// The tool-call context the SDK hands to the permission callback
/// (spec §4.3: `{toolUseId, signal, suggestions?, blockedPath?,
/// decisionReason?, agentID?}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCallbackContext {
    /// The SDK's tool-use identifier.
    pub tool_use_id: String,
    /// Suggested resolutions, to be prepended before the default
    /// Allow / Always Allow / Deny options.
    #[serde(default)]
    pub suggestions: Vec<PermissionSuggestion>,
    /// A path the agent was blocked from accessing, if applicable.
    pub blocked_path: Option<String>,
    /// A human-readable reason the SDK is asking.
    pub decision_reason: Option<String>,
    /// The originating (sub)agent identifier.
    pub agent_id: Option<String>,
}

/// One of the SDK's suggested permission resolutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSuggestion {
    /// The suggestion's kind (e.g. "allow_tool", "deny_tool").
    #[serde(rename = "type")]
    pub kind: String,
    /// Where the suggestion applies (e.g. a file path or tool name).
    pub destination: Option<String>,
    /// The behavior this suggestion implies, if not implied by `kind`.
    pub behavior: Option<String>,
}

/// Cached response from `supportedModels`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportedModels {
    /// Model identifiers the backend currently supports.
    pub models: Vec<String>,
}

/// Cached response from `accountInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Opaque account fields, as reported by the SDK.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Cached response from `mcpServerStatus`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerStatus {
    /// Per-server status, keyed by server name.
    pub servers: HashMap<String, Value>,
}

/// Cached response from `supportedCommands`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportedCommands {
    /// Command names the backend currently supports.
    pub commands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_system_message_carries_its_subtype() {
        let raw = serde_json::json!({"type": "system", "subtype": "init", "model": "x"});
        match SdkMessage::classify(raw) {
            SdkMessage::System { subtype, .. } => assert_eq!(subtype, "init"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn an_unrecognised_type_is_forwarded_verbatim() {
        let raw = serde_json::json!({"type": "something_new", "foo": 1});
        match SdkMessage::classify(raw.clone()) {
            SdkMessage::Unrecognised(value) => assert_eq!(value, raw),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn assistant_content_blocks_round_trip() {
        let raw = serde_json::json!({
            "type": "assistant",
            "content": [{"type": "text", "text": "hi"}],
            "stop_reason": "end_turn",
        });
        match SdkMessage::classify(raw) {
            SdkMessage::Assistant { content, stop_reason, .. } => {
                assert_eq!(content.len(), 1);
                assert_eq!(stop_reason.as_deref(), Some("end_turn"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
