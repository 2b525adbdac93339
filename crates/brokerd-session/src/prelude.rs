//! Commonly used types for convenient import.
//!
//! ```
//! use brokerd_session::prelude::*;
//! ```

// Errors
pub use crate::{SessionError, SessionResult};

// Backends
pub use crate::{ChildController, SdkSession, SubprocessSession};

// Registry
pub use crate::{BackendLaunch, CreateSessionRequest, SessionHandle, SessionManager, SessionManagerDeps};

// Credentials
pub use crate::{resolve_stored_key, CredentialStore};
