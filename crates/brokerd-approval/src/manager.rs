//! The pending-permission table (spec §3, §4.7).
//!
//! Each session owns one [`PermissionTable`]. Entries are keyed by
//! tool-call id and are resolved at most once: answered, cancelled, or
//! drained with a denial when the session terminates.

use std::collections::HashMap;

use brokerd_protocol::acp::{PermissionOption, PermissionOutcome};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{PendingPermission, Resolver, SdkDecision};

/// The outcome to hand back to whichever side opened the permission
/// request, once a tool-call id is resolved.
#[derive(Debug)]
pub enum ResolvedOutcome {
    /// A subprocess backend is waiting on a JSON-RPC response.
    Subprocess {
        /// The request id to reply to.
        request_id: brokerd_protocol::framing::JsonRpcId,
        /// The outcome to embed in the response.
        outcome: PermissionOutcome,
    },
    /// An in-process SDK backend is waiting on its permission callback.
    /// `None` means the callback was already consumed elsewhere (should
    /// not happen under the at-most-once invariant, but is not fatal).
    Sdk(Option<SdkDecision>),
}

/// Per-session table of outstanding permission requests.
#[derive(Default)]
pub struct PermissionTable {
    entries: Mutex<HashMap<String, PendingPermission>>,
}

impl PermissionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending entry (spec §4.7 step 2). Returns the
    /// options so the caller can build the `permission_request` event.
    pub async fn register(&self, tool_call_id: String, entry: PendingPermission) -> Vec<PermissionOption> {
        let options = entry.options.clone();
        self.entries.lock().await.insert(tool_call_id, entry);
        options
    }

    /// Resolve a pending entry with the client's chosen option (spec
    /// §4.7 steps 3-5). `option_id = None` denies.
    ///
    /// # Errors
    ///
    /// [`ApprovalError::NoPendingPermission`] if the id has already been
    /// resolved or was never registered; [`ApprovalError::UnknownOption`]
    /// if `option_id` is not among the entry's options.
    pub async fn resolve(
        &self,
        tool_call_id: &str,
        option_id: Option<String>,
        answers: Option<Value>,
    ) -> ApprovalResult<ResolvedOutcome> {
        let entry = self
            .entries
            .lock()
            .await
            .remove(tool_call_id)
            .ok_or_else(|| ApprovalError::NoPendingPermission { tool_call_id: tool_call_id.to_string() })?;

        let Some(option_id) = option_id else {
            return Ok(deny(entry, "permission denied by client".to_string(), false));
        };

        let Some(selected) = entry.options.iter().find(|o| o.option_id == option_id) else {
            return Err(ApprovalError::UnknownOption {
                tool_call_id: tool_call_id.to_string(),
                option_id,
            });
        };
        let denies = option_kind_denies(&selected.kind);

        Ok(match entry.resolver {
            Resolver::Subprocess { request_id } => ResolvedOutcome::Subprocess {
                request_id,
                outcome: PermissionOutcome::Selected { option_id, updated_input: answers },
            },
            Resolver::Sdk { reply } => {
                let decision = if denies {
                    SdkDecision::Deny {
                        tool_use_id: tool_call_id.to_string(),
                        message: "permission denied by client".to_string(),
                        interrupt: false,
                    }
                } else {
                    SdkDecision::Allow { tool_use_id: tool_call_id.to_string(), updated_input: answers }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(decision);
                }
                ResolvedOutcome::Sdk(None)
            }
        })
    }

    /// Cancel a pending entry (spec §4.7 step 6): produces the
    /// cancelled/denied outcome and removes the entry.
    ///
    /// # Errors
    ///
    /// [`ApprovalError::NoPendingPermission`] if there is no such entry.
    pub async fn cancel(&self, tool_call_id: &str) -> ApprovalResult<ResolvedOutcome> {
        let entry = self
            .entries
            .lock()
            .await
            .remove(tool_call_id)
            .ok_or_else(|| ApprovalError::NoPendingPermission { tool_call_id: tool_call_id.to_string() })?;
        Ok(deny(entry, "permission request cancelled".to_string(), false))
    }

    /// Drain every outstanding entry with a denial carrying an interrupt
    /// flag (spec §4.7 step 7, used on session termination).
    pub async fn drain_with_denial(&self) -> Vec<ResolvedOutcome> {
        let drained: Vec<PendingPermission> = self.entries.lock().await.drain().map(|(_, v)| v).collect();
        drained.into_iter().map(|e| deny(e, "session terminated".to_string(), true)).collect()
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

/// Whether a presented option's `kind` denies the tool call rather than
/// allowing it (`reject_once`, `reject_always`, `deny_tool`, ...). Only
/// SDK backends need this distinction: a subprocess backend's resolver
/// just echoes `optionId` back and lets the backend itself interpret it.
fn option_kind_denies(kind: &str) -> bool {
    kind.contains("reject") || kind.contains("deny")
}

fn deny(entry: PendingPermission, message: String, interrupt: bool) -> ResolvedOutcome {
    match entry.resolver {
        Resolver::Subprocess { request_id } => {
            ResolvedOutcome::Subprocess { request_id, outcome: PermissionOutcome::Cancelled }
        }
        Resolver::Sdk { reply } => {
            let decision = SdkDecision::Deny { tool_use_id: String::new(), message, interrupt };
            if let Some(reply) = reply {
                let _ = reply.send(decision);
            }
            ResolvedOutcome::Sdk(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerd_protocol::framing::JsonRpcId;

    fn subprocess_entry(options: Vec<PermissionOption>) -> PendingPermission {
        PendingPermission {
            options,
            context: serde_json::json!({}),
            resolver: Resolver::Subprocess { request_id: JsonRpcId::Number(1) },
        }
    }

    fn option(id: &str) -> PermissionOption {
        PermissionOption { option_id: id.to_string(), kind: "allow_once".to_string(), label: None }
    }

    #[tokio::test]
    async fn resolving_an_unknown_tool_call_id_fails() {
        let table = PermissionTable::new();
        let err = table.resolve("missing", Some("ok".to_string()), None).await.unwrap_err();
        assert!(matches!(err, ApprovalError::NoPendingPermission { .. }));
    }

    #[tokio::test]
    async fn a_second_response_for_the_same_id_fails() {
        let table = PermissionTable::new();
        table.register("T1".to_string(), subprocess_entry(vec![option("ok")])).await;

        table.resolve("T1", Some("ok".to_string()), None).await.unwrap();
        let second = table.resolve("T1", Some("ok".to_string()), None).await;
        assert!(matches!(second, Err(ApprovalError::NoPendingPermission { .. })));
    }

    #[tokio::test]
    async fn selecting_an_option_not_presented_is_rejected() {
        let table = PermissionTable::new();
        table.register("T1".to_string(), subprocess_entry(vec![option("ok")])).await;

        let err = table.resolve("T1", Some("nope".to_string()), None).await.unwrap_err();
        assert!(matches!(err, ApprovalError::UnknownOption { .. }));
    }

    #[tokio::test]
    async fn denying_with_no_option_id_produces_a_cancelled_outcome() {
        let table = PermissionTable::new();
        table.register("T1".to_string(), subprocess_entry(vec![option("ok")])).await;

        let outcome = table.resolve("T1", None, None).await.unwrap();
        match outcome {
            ResolvedOutcome::Subprocess { outcome, .. } => {
                assert!(matches!(outcome, PermissionOutcome::Cancelled));
            }
            ResolvedOutcome::Sdk(_) => panic!("expected a subprocess outcome"),
        }
    }

    fn sdk_entry(options: Vec<PermissionOption>) -> (PendingPermission, tokio::sync::oneshot::Receiver<SdkDecision>) {
        let (reply, rx) = tokio::sync::oneshot::channel();
        (PendingPermission { options, context: serde_json::json!({}), resolver: Resolver::Sdk { reply: Some(reply) } }, rx)
    }

    #[tokio::test]
    async fn selecting_a_reject_option_denies_an_sdk_backed_request() {
        let table = PermissionTable::new();
        let reject = PermissionOption { option_id: "reject_once".to_string(), kind: "reject_once".to_string(), label: None };
        let (entry, reply) = sdk_entry(vec![option("allow_once"), reject]);
        table.register("T1".to_string(), entry).await;

        table.resolve("T1", Some("reject_once".to_string()), None).await.unwrap();
        assert!(matches!(reply.await.unwrap(), SdkDecision::Deny { .. }));
    }

    #[tokio::test]
    async fn selecting_an_allow_option_approves_an_sdk_backed_request() {
        let table = PermissionTable::new();
        let (entry, reply) = sdk_entry(vec![option("allow_once")]);
        table.register("T1".to_string(), entry).await;

        table.resolve("T1", Some("allow_once".to_string()), None).await.unwrap();
        assert!(matches!(reply.await.unwrap(), SdkDecision::Allow { .. }));
    }

    #[tokio::test]
    async fn draining_resolves_every_outstanding_entry() {
        let table = PermissionTable::new();
        table.register("T1".to_string(), subprocess_entry(vec![option("ok")])).await;
        table.register("T2".to_string(), subprocess_entry(vec![option("ok")])).await;

        let drained = table.drain_with_denial().await;
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty().await);
    }
}
