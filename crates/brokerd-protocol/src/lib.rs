//! Newline-delimited JSON-RPC 2.0 framing and Agent Client Protocol (ACP)
//! message shapes for the brokerd subprocess backend.
//!
//! This crate owns only the wire format: parsing, serialising, and
//! classifying messages, plus the typed params/results the subprocess
//! session exchanges with the backend. It knows nothing about pending
//! requests, sessions, or transports — those live in `brokerd-session`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod acp;
pub mod framing;

pub use acp::{
    CancelParams, ClientCapabilities, FileSystemCapabilities, InitializeParams, InitializeResult,
    NewSessionParams, NewSessionResult, PermissionOption, PermissionOutcome, PromptParams,
    PromptResult, RequestPermissionParams, RequestPermissionResult, SessionUpdateNotification,
    StopReason,
};
pub use framing::{JsonRpcId, Message, MessageKind, ProtocolError, classify, parse_line, serialize_message};
