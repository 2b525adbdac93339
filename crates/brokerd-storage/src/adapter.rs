//! The Persistence Adapter (spec §2, §3, §4.2, §4.3): the narrow
//! interface sessions call to record state transitions, resumability,
//! and transcript entries.

use std::sync::Arc;

use async_trait::async_trait;
use brokerd_audit::{EventLog, Role, SessionEventEntry, TranscriptEntry};
use brokerd_core::{BackendId, SessionId};
use serde_json::Value;
use tracing::instrument;

use crate::error::{StorageError, StorageResult};
use crate::kv::KvStore;
use crate::records::{SessionRecord, WorkspaceRecord};

const NS_SESSIONS: &str = "sessions";
const NS_MESSAGES: &str = "messages";
const NS_SESSION_EVENTS: &str = "session_events";
const NS_WORKSPACES: &str = "workspaces";

/// The interface a session calls into to persist its own lifecycle.
///
/// This is deliberately narrower than [`KvStore`]: sessions never see
/// raw keys, only the record types spec §3 names.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Insert or overwrite a session's record.
    async fn put_session(&self, record: SessionRecord) -> StorageResult<()>;

    /// Fetch a session's record.
    async fn get_session(&self, session_id: SessionId) -> StorageResult<Option<SessionRecord>>;

    /// List every session record currently flagged resumable (spec §4.3:
    /// "`listResumable`" — used by `SessionManager::connect`).
    async fn list_resumable(&self) -> StorageResult<Vec<SessionRecord>>;

    /// Called on gateway startup: every persisted session is transitioned
    /// from whatever it was to `Idle` (spec §4.3: "no session remains
    /// in-memory active across a restart").
    async fn mark_all_idle_on_startup(&self) -> StorageResult<()>;

    /// Update a session's backend id and configuration snapshot (spec
    /// §4.2: "Backend-id replacement").
    async fn update_backend_id(&self, session_id: SessionId, backend_id: BackendId, config_snapshot: Value) -> StorageResult<()>;

    /// Append a transcript entry for a session.
    async fn append_transcript(&self, entry: TranscriptEntry) -> StorageResult<()>;

    /// Append an operational session-event entry.
    async fn append_session_event(&self, entry: SessionEventEntry) -> StorageResult<()>;

    /// Read back a session's transcript, oldest first.
    async fn transcript(&self, session_id: SessionId) -> StorageResult<Vec<TranscriptEntry>>;

    /// Upsert a workspace record.
    async fn put_workspace(&self, record: WorkspaceRecord) -> StorageResult<()>;
}

/// A [`PersistenceAdapter`] backed by any [`KvStore`].
///
/// Doubles as the durable [`EventLog`] implementation brokerd-audit
/// defers to, so audit entries and session records share one
/// single-writer store (spec §5).
pub struct KvPersistenceAdapter {
    kv: Arc<dyn KvStore>,
}

impl KvPersistenceAdapter {
    /// Wrap a [`KvStore`] as a persistence adapter.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn transcript_key(session_id: SessionId, entry_id: uuid::Uuid) -> String {
        format!("{session_id}/{entry_id}")
    }
}

#[async_trait]
impl PersistenceAdapter for KvPersistenceAdapter {
    #[instrument(skip(self, record), fields(session_id = %record.session_id))]
    async fn put_session(&self, record: SessionRecord) -> StorageResult<()> {
        let bytes = serde_json::to_vec(&record)?;
        self.kv.set(NS_SESSIONS, &record.session_id.to_string(), bytes).await
    }

    async fn get_session(&self, session_id: SessionId) -> StorageResult<Option<SessionRecord>> {
        match self.kv.get(NS_SESSIONS, &session_id.to_string()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_resumable(&self) -> StorageResult<Vec<SessionRecord>> {
        let mut out = Vec::new();
        for key in self.kv.list_keys(NS_SESSIONS).await? {
            if let Some(bytes) = self.kv.get(NS_SESSIONS, &key).await? {
                let record: SessionRecord = serde_json::from_slice(&bytes)?;
                if record.is_resumable() {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    async fn mark_all_idle_on_startup(&self) -> StorageResult<()> {
        for key in self.kv.list_keys(NS_SESSIONS).await? {
            let Some(bytes) = self.kv.get(NS_SESSIONS, &key).await? else { continue };
            let mut record: SessionRecord = serde_json::from_slice(&bytes)?;
            record.state = crate::records::SessionState::Idle;
            self.kv.set(NS_SESSIONS, &key, serde_json::to_vec(&record)?).await?;
        }
        Ok(())
    }

    async fn update_backend_id(&self, session_id: SessionId, backend_id: BackendId, config_snapshot: Value) -> StorageResult<()> {
        let mut record = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(session_id.to_string()))?;
        record.backend_id = Some(backend_id);
        record.config_snapshot = config_snapshot;
        self.put_session(record).await
    }

    async fn append_transcript(&self, entry: TranscriptEntry) -> StorageResult<()> {
        let key = Self::transcript_key(entry.session_id, entry.id);
        self.kv.set(NS_MESSAGES, &key, serde_json::to_vec(&entry)?).await
    }

    async fn append_session_event(&self, entry: SessionEventEntry) -> StorageResult<()> {
        let key = Self::transcript_key(entry.session_id, entry.id);
        self.kv.set(NS_SESSION_EVENTS, &key, serde_json::to_vec(&entry)?).await
    }

    async fn transcript(&self, session_id: SessionId) -> StorageResult<Vec<TranscriptEntry>> {
        let prefix = format!("{session_id}/");
        let mut entries = Vec::new();
        for key in self.kv.list_keys(NS_MESSAGES).await? {
            if !key.starts_with(&prefix) {
                continue;
            }
            if let Some(bytes) = self.kv.get(NS_MESSAGES, &key).await? {
                entries.push(serde_json::from_slice::<TranscriptEntry>(&bytes)?);
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn put_workspace(&self, record: WorkspaceRecord) -> StorageResult<()> {
        let bytes = serde_json::to_vec(&record)?;
        self.kv.set(NS_WORKSPACES, &record.workspace_id, bytes).await
    }
}

/// Bridges [`PersistenceAdapter`] to brokerd-audit's [`EventLog`] trait
/// so `brokerd-storage` supplies the durable audit-log implementation
/// (see DESIGN.md: this avoids a circular crate dependency between
/// brokerd-audit and brokerd-storage).
#[async_trait]
impl EventLog for KvPersistenceAdapter {
    async fn append_transcript(&self, entry: TranscriptEntry) -> Result<(), brokerd_audit::AuditError> {
        PersistenceAdapter::append_transcript(self, entry).await.map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))
    }

    async fn append_event(&self, entry: SessionEventEntry) -> Result<(), brokerd_audit::AuditError> {
        PersistenceAdapter::append_session_event(self, entry).await.map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))
    }

    async fn transcript(&self, session_id: SessionId) -> Result<Vec<TranscriptEntry>, brokerd_audit::AuditError> {
        PersistenceAdapter::transcript(self, session_id).await.map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))
    }

    async fn events(&self, session_id: SessionId) -> Result<Vec<SessionEventEntry>, brokerd_audit::AuditError> {
        let prefix = format!("{session_id}/");
        let mut entries = Vec::new();
        for key in self.kv.list_keys(NS_SESSION_EVENTS).await.map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))? {
            if !key.starts_with(&prefix) {
                continue;
            }
            if let Some(bytes) = self.kv.get(NS_SESSION_EVENTS, &key).await.map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))? {
                let entry: SessionEventEntry =
                    serde_json::from_slice(&bytes).map_err(|e| brokerd_audit::AuditError::Store(e.to_string()))?;
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use crate::records::{BackendKind, SessionState};
    use std::path::PathBuf;

    fn adapter() -> KvPersistenceAdapter {
        KvPersistenceAdapter::new(Arc::new(MemoryKvStore::new()))
    }

    fn record(session_id: SessionId, state: SessionState) -> SessionRecord {
        SessionRecord {
            session_id,
            backend_id: Some(BackendId::new("b1")),
            backend_kind: BackendKind::Subprocess,
            config_snapshot: serde_json::json!({}),
            working_directory: PathBuf::from("/tmp"),
            state,
            created_at: chrono::Utc::now(),
            last_activity: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_a_session_record() {
        let adapter = adapter();
        let id = SessionId::new();
        adapter.put_session(record(id, SessionState::Ready)).await.unwrap();

        let fetched = adapter.get_session(id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, id);
    }

    #[tokio::test]
    async fn list_resumable_only_returns_idle_or_ready_sessions_with_a_backend_id() {
        let adapter = adapter();
        let resumable = SessionId::new();
        let terminated = SessionId::new();
        adapter.put_session(record(resumable, SessionState::Idle)).await.unwrap();
        adapter.put_session(record(terminated, SessionState::Terminated)).await.unwrap();

        let resumable_ids: Vec<_> = adapter.list_resumable().await.unwrap().into_iter().map(|r| r.session_id).collect();
        assert_eq!(resumable_ids, vec![resumable]);
    }

    #[tokio::test]
    async fn startup_marks_every_session_idle() {
        let adapter = adapter();
        let id = SessionId::new();
        adapter.put_session(record(id, SessionState::Processing)).await.unwrap();

        adapter.mark_all_idle_on_startup().await.unwrap();

        let fetched = adapter.get_session(id).await.unwrap().unwrap();
        assert_eq!(fetched.state, SessionState::Idle);
    }

    #[tokio::test]
    async fn transcript_entries_come_back_sorted_by_time() {
        let adapter = adapter();
        let id = SessionId::new();
        let now = chrono::Utc::now();
        PersistenceAdapter::append_transcript(
            &adapter,
            TranscriptEntry::new(id, Role::Assistant, serde_json::json!("second"), now + chrono::Duration::seconds(1)),
        )
        .await
        .unwrap();
        PersistenceAdapter::append_transcript(&adapter, TranscriptEntry::new(id, Role::User, serde_json::json!("first"), now))
            .await
            .unwrap();

        let transcript = PersistenceAdapter::transcript(&adapter, id).await.unwrap();
        assert_eq!(transcript[0].content, serde_json::json!("first"));
        assert_eq!(transcript[1].content, serde_json::json!("second"));
    }
}
