//! Contract for the in-process agent SDK backend (spec §4.3).
//!
//! `brokerd-session`'s `SdkSession` is the consumer: it starts a query
//! through [`SdkClient`], classifies each [`types::SdkMessage`] off the
//! stream, and mutates the running query through [`query::SdkQueryHandle`].
//! No concrete SDK integration lives here — only the narrow interface the
//! session needs, mirroring how `brokerd-workspace` models worktree
//! preparation as a trait rather than an implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod query;
mod types;

pub mod prelude;

pub use error::{SdkError, SdkResult};
pub use query::{PermissionCallback, SdkClient, SdkMessageStream, SdkQuery, SdkQueryHandle};
pub use types::{
    AccountInfo, ContentBlock, McpServerStatus, PermissionCallbackContext, PermissionSuggestion,
    SdkMessage, SdkQueryOptions, SessionResult, StreamEventKind, SupportedCommands, SupportedModels,
};
