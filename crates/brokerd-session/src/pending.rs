//! Outbound request correlation for [`crate::subprocess::SubprocessSession`]
//! (spec §4.2: "Request correlation").
//!
//! Distinct from [`brokerd_approval::PermissionTable`]: this table tracks
//! requests *this* gateway sent to the backend and is waiting on a
//! response for (`session/prompt`, and any future outbound method),
//! rather than permission requests the backend sent to the gateway.

use std::collections::HashMap;

use brokerd_protocol::framing::{JsonRpcId, Message};
use tokio::sync::{oneshot, Mutex};

/// Table of outstanding outbound requests, keyed by the id this session
/// minted for them.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<JsonRpcId, oneshot::Sender<Message>>>,
}

impl PendingRequests {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, returning the receiving half directly so the
    /// caller drives its own timeout loop and can remove the entry on
    /// timeout (used by [`crate::subprocess::SubprocessSession`]).
    pub async fn register(&self, id: JsonRpcId) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.entries.lock().await.insert(id, tx);
        rx
    }

    /// Remove `id`'s entry without resolving it (used on timeout).
    pub async fn forget(&self, id: &JsonRpcId) {
        self.entries.lock().await.remove(id);
    }

    /// Deliver a response to its matching pending entry. Returns `false`
    /// if there was no such entry (spec §4.2: "non-matching response ids
    /// are logged and dropped").
    pub async fn resolve(&self, id: &JsonRpcId, response: Message) -> bool {
        match self.entries.lock().await.remove(id) {
            Some(tx) => {
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Cancel every outstanding entry (spec §4.2: "a child-exit event
    /// cancels every outstanding entry"). Dropping each sender makes the
    /// corresponding receiver resolve to an error.
    pub async fn cancel_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of outstanding entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the table has no outstanding entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolving_a_registered_id_delivers_the_response() {
        let table = PendingRequests::new();
        let id = JsonRpcId::Number(1);
        let rx = table.register(id.clone()).await;

        let response = Message::success(id.clone(), json!({"ok": true}));
        assert!(table.resolve(&id, response).await);

        let delivered = rx.await.unwrap();
        assert_eq!(delivered.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn resolving_an_unknown_id_is_reported_as_not_found() {
        let table = PendingRequests::new();
        let response = Message::success(JsonRpcId::Number(99), json!({}));
        assert!(!table.resolve(&JsonRpcId::Number(99), response).await);
    }

    #[tokio::test]
    async fn cancel_all_drops_every_entry() {
        let table = PendingRequests::new();
        let rx1 = table.register(JsonRpcId::Number(1)).await;
        let rx2 = table.register(JsonRpcId::Number(2)).await;

        table.cancel_all().await;

        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn forget_removes_an_entry_without_resolving_it() {
        let table = PendingRequests::new();
        let id = JsonRpcId::Number(1);
        let rx = table.register(id.clone()).await;

        table.forget(&id).await;
        assert!(table.is_empty().await);
        assert!(rx.await.is_err());
    }
}
