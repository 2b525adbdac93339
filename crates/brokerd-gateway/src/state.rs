//! Shared state every axum handler closes over.

use std::sync::Arc;
use std::time::Instant;

use brokerd_config::GatewayConfig;
use brokerd_session::SessionManager;

use crate::credentials::KvCredentialStore;

/// Cloneable handle axum hands to every handler (spec §4.5, §6).
#[derive(Clone)]
pub struct AppState {
    /// The session registry.
    pub sessions: Arc<SessionManager>,
    /// Resolved deployment configuration.
    pub config: Arc<GatewayConfig>,
    /// Encrypted credential storage.
    pub credentials: Arc<KvCredentialStore>,
    /// When this process started, for `uptime_secs` in health responses.
    pub started_at: Instant,
    /// Backend binaries discovered on `PATH` at startup (spec §6:
    /// "readiness incl. backend binary discovery").
    pub discovered_backends: Arc<Vec<String>>,
}

impl AppState {
    /// Seconds since the process started.
    #[must_use]
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
