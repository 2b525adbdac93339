//! Append-only log storage.

use crate::entry::{SessionEventEntry, TranscriptEntry};
use async_trait::async_trait;
use brokerd_core::SessionId;
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from appending to or reading an audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The underlying store rejected the write or read.
    #[error("audit store failure: {0}")]
    Store(String),
}

/// Result alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// An append-only store for transcript entries and session events.
///
/// Implementations must never mutate or delete a previously appended
/// entry. `brokerd-storage` supplies the persisted implementation used in
/// production; [`InMemoryEventLog`] here exists for unit and integration
/// tests that don't need durability.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a transcript entry.
    async fn append_transcript(&self, entry: TranscriptEntry) -> AuditResult<()>;

    /// Append a session-event entry.
    async fn append_event(&self, entry: SessionEventEntry) -> AuditResult<()>;

    /// Read back a session's transcript, oldest first.
    async fn transcript(&self, session_id: SessionId) -> AuditResult<Vec<TranscriptEntry>>;

    /// Read back a session's operational events, oldest first.
    async fn events(&self, session_id: SessionId) -> AuditResult<Vec<SessionEventEntry>>;
}

/// An in-memory [`EventLog`] for tests.
#[derive(Default)]
pub struct InMemoryEventLog {
    transcripts: Mutex<Vec<TranscriptEntry>>,
    events: Mutex<Vec<SessionEventEntry>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_transcript(&self, entry: TranscriptEntry) -> AuditResult<()> {
        self.transcripts.lock().await.push(entry);
        Ok(())
    }

    async fn append_event(&self, entry: SessionEventEntry) -> AuditResult<()> {
        self.events.lock().await.push(entry);
        Ok(())
    }

    async fn transcript(&self, session_id: SessionId) -> AuditResult<Vec<TranscriptEntry>> {
        Ok(self
            .transcripts
            .lock()
            .await
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn events(&self, session_id: SessionId) -> AuditResult<Vec<SessionEventEntry>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Role;

    #[tokio::test]
    async fn appended_transcript_entries_are_scoped_per_session() {
        let log = InMemoryEventLog::new();
        let a = SessionId::new();
        let b = SessionId::new();
        log.append_transcript(TranscriptEntry::new(a, Role::User, serde_json::json!("hi"), chrono::Utc::now()))
            .await
            .unwrap();
        log.append_transcript(TranscriptEntry::new(b, Role::User, serde_json::json!("hi"), chrono::Utc::now()))
            .await
            .unwrap();

        assert_eq!(log.transcript(a).await.unwrap().len(), 1);
        assert_eq!(log.transcript(b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_preserve_append_order() {
        let log = InMemoryEventLog::new();
        let session_id = SessionId::new();
        log.append_event(SessionEventEntry::new(session_id, "created", serde_json::json!({})))
            .await
            .unwrap();
        log.append_event(SessionEventEntry::new(session_id, "terminated", serde_json::json!({})))
            .await
            .unwrap();

        let events = log.events(session_id).await.unwrap();
        assert_eq!(events[0].event_type, "created");
        assert_eq!(events[1].event_type, "terminated");
    }
}
