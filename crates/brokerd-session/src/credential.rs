//! The encrypted credential store (spec §4.8): an external collaborator.
//!
//! `SessionManager::create` resolves `authRequest.storedCredentialId`
//! through this narrow interface, then opens the returned envelope with
//! the deployment's master key (spec §6: "CREDENTIAL_MASTER_KEY"). The
//! store itself — wherever envelopes actually live — is out of scope
//! (spec §1 Non-goals), the same way `brokerd-workspace` treats the
//! git-worktree manager.

use async_trait::async_trait;
use brokerd_crypto::{Envelope, MasterKey};

use crate::error::SessionResult;

/// Fetches a sealed credential envelope by id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the envelope stored under `credential_id`.
    async fn load_envelope(&self, credential_id: &str) -> SessionResult<Envelope>;
}

/// Resolve `credential_id` to its decrypted plaintext (spec §4.8:
/// "fetched from the encrypted store and decrypted into a short-lived
/// in-memory value; it is not logged or returned").
pub async fn resolve_stored_key(
    store: &dyn CredentialStore,
    credential_id: &str,
    master_key: &MasterKey,
) -> SessionResult<String> {
    let envelope = store.load_envelope(credential_id).await?;
    Ok(envelope.open(master_key)?)
}
