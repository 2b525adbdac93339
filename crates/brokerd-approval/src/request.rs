//! Pending-permission entries (spec §3, §4.7).

use brokerd_protocol::acp::PermissionOption;
use serde_json::Value;
use tokio::sync::oneshot;

/// The decision handed back to an in-process SDK backend's permission
/// callback (spec §4.7 step 4).
#[derive(Debug, Clone)]
pub enum SdkDecision {
    /// The client approved, possibly with a mutated tool input.
    Allow {
        /// The SDK's own tool-use identifier.
        tool_use_id: String,
        /// Updated input, when the permission tool is a structured form.
        updated_input: Option<Value>,
    },
    /// The client denied, or the session terminated with the entry still
    /// open.
    Deny {
        /// The SDK's own tool-use identifier.
        tool_use_id: String,
        /// A human-readable reason surfaced to the agent.
        message: String,
        /// Set when termination forced the denial rather than an explicit
        /// client rejection (spec §4.7 step 7).
        interrupt: bool,
    },
}

/// How a pending permission entry will be resolved, depending on which
/// kind of backend originated the request.
pub enum Resolver {
    /// A subprocess backend is blocked on a `session/request_permission`
    /// JSON-RPC request; resolving means sending its response.
    Subprocess {
        /// The open JSON-RPC request id to reply to.
        request_id: brokerd_protocol::framing::JsonRpcId,
    },
    /// An in-process SDK backend is blocked on its permission callback;
    /// resolving means completing this one-shot channel.
    Sdk {
        /// The callback's resolution channel. `None` once taken.
        reply: Option<oneshot::Sender<SdkDecision>>,
    },
}

/// One outstanding permission request, keyed by tool-call id in the
/// session's pending-permission table.
pub struct PendingPermission {
    /// The options the client may choose from.
    pub options: Vec<PermissionOption>,
    /// Backend-supplied context (`blockedPath`, `decisionReason`,
    /// `agentID`, or the raw tool-call object for subprocess backends).
    pub context: Value,
    /// How to deliver the eventual decision.
    pub resolver: Resolver,
}
