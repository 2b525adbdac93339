//! Unified prelude for the brokerd agent gateway.
//!
//! A single import that brings in the commonly used types from every
//! crate in the workspace, so call sites outside the crates themselves
//! (the binary, integration tests, downstream tooling) don't have to
//! manage imports from a dozen crates by hand.
//!
//! ```rust,ignore
//! use brokerd_prelude::*;
//! ```
//!
//! A handful of names are intentionally ambiguous here (`SessionResult`
//! is both `brokerd_session`'s and `brokerd_sdk`'s own result alias;
//! `resolve` is both `brokerd_config`'s env resolution and
//! `brokerd_workspace`'s working-directory resolution) — glob imports
//! tolerate the overlap until a caller actually names the ambiguous
//! identifier unqualified, at which point importing the owning crate's
//! own prelude directly resolves it.
//!
//! # Per-crate preludes
//!
//! ```rust,ignore
//! use brokerd_session::prelude::*;
//! use brokerd_sdk::prelude::*;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub use brokerd_approval::prelude::*;
pub use brokerd_audit::prelude::*;
pub use brokerd_config::prelude::*;
pub use brokerd_core::prelude::*;
pub use brokerd_events::prelude::*;
pub use brokerd_gateway::prelude::*;
pub use brokerd_sdk::prelude::*;
pub use brokerd_session::prelude::*;
pub use brokerd_storage::prelude::*;
pub use brokerd_telemetry::prelude::*;
pub use brokerd_terminal::prelude::*;
pub use brokerd_workspace::prelude::*;

// brokerd-crypto and brokerd-protocol carry no `prelude` module of
// their own (their public surface is already small); re-exported
// directly from their crate roots instead.
pub use brokerd_crypto::{CryptoError, CryptoResult, Envelope, MasterKey};
pub use brokerd_protocol::{
    classify, parse_line, serialize_message, CancelParams, ClientCapabilities, InitializeParams,
    InitializeResult, JsonRpcId, Message, MessageKind, NewSessionParams, NewSessionResult,
    PermissionOption, PermissionOutcome, ProtocolError, PromptParams, PromptResult,
    RequestPermissionParams, RequestPermissionResult, SessionUpdateNotification, StopReason,
};
