//! Credential storage for `/v1/credentials` (spec §6), backed by a
//! namespaced [`KvStore`] rather than the bespoke store spec §4.8 treats
//! as an external collaborator — the gateway is the process that owns
//! that collaborator, so it has to implement one.

use std::sync::Arc;

use async_trait::async_trait;
use brokerd_crypto::{Envelope, MasterKey};
use brokerd_session::{CredentialStore, SessionError, SessionResult};
use brokerd_storage::kv::KvStore;

const NAMESPACE: &str = "credentials";

/// A [`CredentialStore`] that seals/opens envelopes in a [`KvStore`]
/// namespace, keyed by the caller-supplied credential id.
pub struct KvCredentialStore {
    kv: Arc<dyn KvStore>,
    master_key: Arc<MasterKey>,
}

impl KvCredentialStore {
    /// Wrap `kv`, sealing and opening envelopes with `master_key`.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, master_key: Arc<MasterKey>) -> Self {
        Self { kv, master_key }
    }

    /// Seal `plaintext` under `credential_id`, overwriting any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if sealing or the underlying write fails.
    pub async fn store(&self, credential_id: &str, plaintext: &str) -> SessionResult<()> {
        let envelope = Envelope::seal(&self.master_key, plaintext)?;
        let bytes = serde_json::to_vec(&envelope).map_err(|e| SessionError::Internal(e.to_string()))?;
        self.kv
            .set(NAMESPACE, credential_id, bytes)
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        Ok(())
    }

    /// List every stored credential id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the underlying store cannot be listed.
    pub async fn list(&self) -> SessionResult<Vec<String>> {
        self.kv.list_keys(NAMESPACE).await.map_err(|e| SessionError::Internal(e.to_string()))
    }

    /// Remove a stored credential. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the underlying delete fails.
    pub async fn delete(&self, credential_id: &str) -> SessionResult<bool> {
        self.kv.delete(NAMESPACE, credential_id).await.map_err(|e| SessionError::Internal(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for KvCredentialStore {
    async fn load_envelope(&self, credential_id: &str) -> SessionResult<Envelope> {
        let bytes = self
            .kv
            .get(NAMESPACE, credential_id)
            .await
            .map_err(|e| SessionError::Internal(e.to_string()))?
            .ok_or_else(|| SessionError::Internal(format!("no such credential: {credential_id}")))?;
        serde_json::from_slice(&bytes).map_err(|e| SessionError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerd_storage::kv::MemoryKvStore;

    fn store() -> KvCredentialStore {
        KvCredentialStore::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MasterKey::new("correct horse battery staple")),
        )
    }

    #[tokio::test]
    async fn a_stored_credential_round_trips_through_load_envelope() {
        let store = store();
        store.store("cred1", "sk-ant-abc123").await.unwrap();
        let envelope = store.load_envelope("cred1").await.unwrap();
        let plaintext = envelope.open(&store.master_key).unwrap();
        assert_eq!(plaintext, "sk-ant-abc123");
    }

    #[tokio::test]
    async fn list_reflects_stored_ids() {
        let store = store();
        store.store("cred1", "a").await.unwrap();
        store.store("cred2", "b").await.unwrap();
        let mut ids = store.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["cred1".to_string(), "cred2".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_whether_the_credential_existed() {
        let store = store();
        store.store("cred1", "a").await.unwrap();
        assert!(store.delete("cred1").await.unwrap());
        assert!(!store.delete("cred1").await.unwrap());
    }

    #[tokio::test]
    async fn loading_an_unknown_credential_fails() {
        let store = store();
        assert!(store.load_envelope("missing").await.is_err());
    }
}
