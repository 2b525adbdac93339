//! Core ids, errors, and shared types for the brokerd agent gateway.
//!
//! This crate provides the small vocabulary every other brokerd crate
//! depends on: session/backend/tool-call identifiers, a shared error
//! taxonomy, a redacting secret wrapper, and a retry helper for the
//! gateway's idempotent persistence operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod ids;
pub mod prelude;
pub mod retry;
pub mod secret;

pub use error::{GatewayError, GatewayResult};
pub use ids::{BackendId, SessionId, Timestamp, ToolCallId};
pub use retry::{RetryConfig, retry};
pub use secret::Secret;
