//! HTTP/WS/SSE transport for the brokerd agent gateway (spec §6).
//!
//! This crate is the externally visible half of brokerd: it turns
//! `brokerd-session`'s typed `SessionManager` API into the endpoint
//! table spec §6 describes — session CRUD, a typed RPC/control-message
//! surface, SSE and `WebSocket` event fan-out, credential storage, and
//! health/readiness probes. Working-directory preparation
//! (`/v1/workspaces/*`) is explicitly out of scope here; spec §6 itself
//! marks that row "(external)".
//!
//! # Architecture
//!
//! ```text
//! brokerd-gatewayd (bin)
//! └── brokerd-gateway (this crate)
//!     ├── auth        — bearer-token middleware
//!     ├── credentials — encrypted credential store (/v1/credentials)
//!     ├── health      — liveness/readiness checks
//!     ├── server      — axum router and handlers
//!     ├── state       — shared AppState
//!     ├── wire         — request/response DTOs
//!     └── brokerd-session (session lifecycle layer)
//!         └── brokerd-sdk / brokerd-workspace / brokerd-approval / ...
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod auth;
pub mod credentials;
pub mod error;
pub mod health;
pub mod prelude;
pub mod server;
pub mod state;
pub mod wire;

pub use credentials::KvCredentialStore;
pub use error::{GatewayApiError, GatewayApiResult};
pub use health::{liveness, readiness, HealthCheck, HealthState, HealthStatus};
pub use server::router;
pub use state::AppState;
