//! Append-only log entry shapes (spec §3).

use brokerd_core::{SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human or programmatic client.
    User,
    /// The agent backend.
    Assistant,
    /// A system-level message (e.g. a hook or init notice).
    System,
}

/// One message in a session's transcript.
///
/// Invariants (spec §3): timestamps are non-decreasing per session;
/// identifiers are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Session this entry belongs to.
    pub session_id: SessionId,
    /// Who authored it.
    pub role: Role,
    /// The content (opaque; text, content blocks, or a structured event).
    pub content: Value,
    /// When it was recorded.
    pub timestamp: Timestamp,
}

impl TranscriptEntry {
    /// Build a new entry stamped with the given session and timestamp.
    #[must_use]
    pub fn new(session_id: SessionId, role: Role, content: Value, timestamp: Timestamp) -> Self {
        Self { id: Uuid::new_v4(), session_id, role, content, timestamp }
    }
}

/// An operational audit record (spec §3: "Session-event log entry").
///
/// Append-only: entries are never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEventEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Session this entry concerns.
    pub session_id: SessionId,
    /// Coarse event type (`"created"`, `"terminated"`, `"permission_denied"`,
    /// `"backend_error"`, `"response_dropped"`, ...).
    pub event_type: String,
    /// Structured detail.
    pub payload: Value,
    /// When the event occurred.
    pub timestamp: Timestamp,
}

impl SessionEventEntry {
    /// Build a new entry stamped with the current time.
    #[must_use]
    pub fn new(session_id: SessionId, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            event_type: event_type.into(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_event_entry_carries_its_own_id_and_timestamp() {
        let a = SessionEventEntry::new(SessionId::new(), "created", serde_json::json!({}));
        let b = SessionEventEntry::new(SessionId::new(), "created", serde_json::json!({}));
        assert_ne!(a.id, b.id);
    }
}
