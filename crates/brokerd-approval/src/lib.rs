//! Permission mediation and hosted-auth policy for the brokerd agent
//! gateway.
//!
//! Owns the pending-permission table (spec §3, §4.7) that every session
//! uses to correlate a backend-originated permission request with the
//! client's eventual decision, and the hosted-auth policy (spec §4.8)
//! that session creation is validated against.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod manager;
pub mod policy;
pub mod prelude;
pub mod request;

pub use error::{ApprovalError, ApprovalResult};
pub use manager::{PermissionTable, ResolvedOutcome};
pub use policy::{ApiKeyRef, AuthMode, AuthRequest, HostedAuthPolicy};
pub use request::{PendingPermission, Resolver, SdkDecision};
