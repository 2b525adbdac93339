//! Commonly used types for convenient import.
//!
//! ```
//! use brokerd_gateway::prelude::*;
//! ```

// Errors
pub use crate::{GatewayApiError, GatewayApiResult};

// Health
pub use crate::{liveness, readiness, HealthCheck, HealthState, HealthStatus};

// Transport
pub use crate::{router, AppState, KvCredentialStore};
