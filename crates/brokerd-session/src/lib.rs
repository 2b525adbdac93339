//! Session lifecycle management: the two backend kinds a session can be
//! driven by (a spawned subprocess speaking ACP, or an in-process agent
//! SDK), the registry that owns every live session, and the pieces they
//! share (outbound-request correlation, pending permissions, stored
//! credentials).
//!
//! # Architecture
//!
//! [`SessionManager`] is the sole owner of every [`SubprocessSession`]
//! and [`SdkSession`]; callers never hold a backend directly, only a
//! session id and a subscription to its fan-out of session events.
//! Both backends share the same outbound shape: a concurrent-prompt
//! guard, an idle-eviction task, and a shared permission table for
//! requests the backend blocks on.

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod credential;
mod error;
mod manager;
mod pending;
mod sdk;
mod subprocess;

pub use credential::{resolve_stored_key, CredentialStore};
pub use error::{SessionError, SessionResult};
pub use manager::{
    BackendLaunch, CreateSessionRequest, SessionHandle, SessionManager, SessionManagerDeps,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONCURRENT_SESSIONS, DEFAULT_REQUEST_TIMEOUT,
};
pub use pending::PendingRequests;
pub use sdk::{SdkDeps, SdkSession};
pub use subprocess::{ChildController, SubprocessDeps, SubprocessLaunchConfig, SubprocessSession, DEFAULT_MAX_MESSAGE_SIZE};
