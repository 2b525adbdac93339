//! The resolved configuration struct (spec §6).

use std::time::Duration;

use brokerd_core::Secret;

/// Rate-limiting knobs (spec §6: "rate limits"; enforcement itself is the
/// HTTP server framework's job — the gateway only carries the config).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_second: u32,
    /// Burst allowance above the sustained rate.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_second: 20, burst: 40 }
    }
}

/// The gateway's resolved, process-wide configuration.
///
/// Built once at startup from environment variables (see [`crate::env`]).
/// Everything here is either a connection/limit knob or a secret kept
/// only in memory — never a model-provider API key, which spec §6
/// requires the gateway ignore in its own environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port the HTTP/WS/SSE server binds.
    pub port: u16,
    /// Bearer token external callers must present (auth itself is
    /// delegated; see spec §1 Non-goals).
    pub bearer_token: Secret,
    /// Whether this deployment is hosted/multi-tenant (gates
    /// `HostedAuthPolicy::hosted()` in `brokerd-approval`).
    pub hosted_mode: bool,
    /// Master passphrase for the credential envelope (`brokerd-crypto`).
    pub credential_master_key: Secret,
    /// Default per-session idle timeout (spec §5: default 10 min).
    pub idle_timeout: Duration,
    /// Default per-outbound-request timeout (spec §5: default 5 min).
    pub rpc_timeout: Duration,
    /// Hard cap on concurrently live sessions.
    pub max_concurrent_sessions: usize,
    /// Hard cap on a single JSON-RPC message's serialised size.
    pub max_message_size: usize,
    /// Rate-limit knobs passed through to the HTTP server framework.
    pub rate_limit: RateLimitConfig,
    /// Whether to auto-discover backend binaries on `PATH` rather than
    /// requiring an explicit path per session-creation request.
    pub auto_discover_backends: bool,
}
