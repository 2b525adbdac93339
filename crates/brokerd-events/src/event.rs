//! The event shapes a session emits to subscribers (spec §4.6).

use brokerd_core::{SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event a session emits to every subscriber (WebSocket or SSE).
///
/// Matches the set named in spec §4.6: `message`, `session_update`,
/// `permission_request`, `exit`, `activity`, `idle`, `error`, `stderr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A chat-style message chunk (text, thinking, tool_use, ...).
    Message {
        /// Session this event belongs to.
        session_id: SessionId,
        /// Opaque payload, shape depends on backend kind.
        payload: Value,
    },
    /// A raw `session/update` notification, forwarded verbatim.
    SessionUpdate {
        /// Session this event belongs to.
        session_id: SessionId,
        /// The update payload.
        payload: Value,
    },
    /// A backend asks the client to approve a tool call.
    PermissionRequest {
        /// Session this event belongs to.
        session_id: SessionId,
        /// The tool-call id this request concerns, as a string for wire
        /// transport.
        tool_call_id: String,
        /// Offered options.
        options: Vec<Value>,
        /// Free-form context (`blockedPath`, `decisionReason`, `agentID`).
        context: Value,
    },
    /// The backend process/query has exited; the session is terminated.
    Exit {
        /// Session this event belongs to.
        session_id: SessionId,
        /// Process exit code, if applicable.
        code: Option<i32>,
        /// Terminating signal, if applicable.
        signal: Option<i32>,
    },
    /// Last-activity timestamp was refreshed.
    Activity {
        /// Session this event belongs to.
        session_id: SessionId,
        /// The new last-activity timestamp.
        at: Timestamp,
    },
    /// The session went idle and is terminating itself.
    Idle {
        /// Session this event belongs to.
        session_id: SessionId,
    },
    /// A session-scoped error occurred.
    Error {
        /// Session this event belongs to.
        session_id: SessionId,
        /// Human-readable message.
        message: String,
    },
    /// A line of backend stderr output, purely observational.
    Stderr {
        /// Session this event belongs to.
        session_id: SessionId,
        /// The raw line.
        line: String,
    },
    /// A prompt completed (success or cancellation).
    PromptComplete {
        /// Session this event belongs to.
        session_id: SessionId,
        /// Completion payload (stop reason, usage, etc).
        payload: Value,
    },
}

impl SessionEvent {
    /// The session this event concerns.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Message { session_id, .. }
            | Self::SessionUpdate { session_id, .. }
            | Self::PermissionRequest { session_id, .. }
            | Self::Exit { session_id, .. }
            | Self::Activity { session_id, .. }
            | Self::Idle { session_id }
            | Self::Error { session_id, .. }
            | Self::Stderr { session_id, .. }
            | Self::PromptComplete { session_id, .. } => *session_id,
        }
    }

    /// Whether backpressure must never drop this event (spec §4.6: "the
    /// first event of each permission request, every tool-call
    /// start/update, the session completion event, and every error").
    ///
    /// Tool-call start/update detection is approximated here by tagging
    /// `Message` events whose payload carries `"tool_call"` — callers that
    /// build those payloads are expected to include that marker.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        match self {
            Self::PermissionRequest { .. }
            | Self::Exit { .. }
            | Self::Error { .. }
            | Self::PromptComplete { .. } => true,
            Self::Message { payload, .. } | Self::SessionUpdate { payload, .. } => {
                payload.get("tool_call").is_some()
            },
            Self::Activity { .. } | Self::Idle { .. } | Self::Stderr { .. } => false,
        }
    }

    /// Whether this event may be coalesced with an immediately preceding
    /// event of the same kind under backpressure (spec §4.6: "text deltas
    /// may be coalesced").
    #[must_use]
    pub fn is_coalescible(&self) -> bool {
        matches!(self, Self::Message { .. }) && !self.is_critical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_request_is_always_critical() {
        let event = SessionEvent::PermissionRequest {
            session_id: SessionId::new(),
            tool_call_id: "t1".into(),
            options: vec![],
            context: Value::Null,
        };
        assert!(event.is_critical());
        assert!(!event.is_coalescible());
    }

    #[test]
    fn plain_text_message_is_coalescible_but_not_critical() {
        let event = SessionEvent::Message {
            session_id: SessionId::new(),
            payload: serde_json::json!({"text": "hi"}),
        };
        assert!(!event.is_critical());
        assert!(event.is_coalescible());
    }

    #[test]
    fn tool_call_message_is_critical() {
        let event = SessionEvent::Message {
            session_id: SessionId::new(),
            payload: serde_json::json!({"tool_call": {"id": "t1"}}),
        };
        assert!(event.is_critical());
    }
}
