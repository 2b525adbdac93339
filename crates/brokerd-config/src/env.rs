//! Environment-variable resolution (spec §6).
//!
//! Every knob is read under a `BROKERD_` prefix. Per spec §6, model-
//! provider API-key variables (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`,
//! ...) are deliberately never read here and never auto-forwarded to
//! backend children — that's `brokerd-approval`'s `HostedAuthPolicy`
//! and each session's own `env` map, not process-wide config.

use std::collections::HashMap;
use std::env::VarError;
use std::time::Duration;

use brokerd_core::Secret;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{GatewayConfig, RateLimitConfig};

/// Something that resolves an environment variable by name. Implemented
/// for `HashMap<String, String>` in tests; production code uses
/// [`EnvLookup::process_env`].
pub trait EnvLookup {
    /// Fetch a variable, distinguishing "unset" from other failures.
    fn get(&self, name: &str) -> Result<String, VarError>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, name: &str) -> Result<String, VarError> {
        std::env::var(name)
    }
}

impl EnvLookup for HashMap<String, String> {
    fn get(&self, name: &str) -> Result<String, VarError> {
        self.get(name).cloned().ok_or(VarError::NotPresent)
    }
}

fn required(env: &dyn EnvLookup, name: &str) -> ConfigResult<String> {
    env.get(name).map_err(|_| ConfigError::MissingRequired { name: name.to_string() })
}

fn optional(env: &dyn EnvLookup, name: &str, default: &str) -> String {
    env.get(name).unwrap_or_else(|_| default.to_string())
}

fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> ConfigResult<T> {
    raw.parse().map_err(|_| ConfigError::InvalidValue { name: name.to_string(), reason: format!("{raw:?} is not valid") })
}

/// Resolve a [`GatewayConfig`] from `env`.
///
/// # Errors
///
/// [`ConfigError::MissingRequired`] if `BROKERD_BEARER_TOKEN` or
/// `BROKERD_CREDENTIAL_MASTER_KEY` is unset; [`ConfigError::InvalidValue`]
/// if a numeric or boolean knob doesn't parse.
pub fn resolve(env: &dyn EnvLookup) -> ConfigResult<GatewayConfig> {
    let port = parse("BROKERD_PORT", &optional(env, "BROKERD_PORT", "8787"))?;
    let bearer_token = Secret::new(required(env, "BROKERD_BEARER_TOKEN")?);
    let hosted_mode = parse("BROKERD_HOSTED_MODE", &optional(env, "BROKERD_HOSTED_MODE", "false"))?;
    let credential_master_key = Secret::new(required(env, "BROKERD_CREDENTIAL_MASTER_KEY")?);

    let idle_timeout_secs: u64 = parse("BROKERD_IDLE_TIMEOUT_SECS", &optional(env, "BROKERD_IDLE_TIMEOUT_SECS", "600"))?;
    let rpc_timeout_secs: u64 = parse("BROKERD_RPC_TIMEOUT_SECS", &optional(env, "BROKERD_RPC_TIMEOUT_SECS", "300"))?;
    let max_concurrent_sessions = parse("BROKERD_MAX_SESSIONS", &optional(env, "BROKERD_MAX_SESSIONS", "64"))?;
    let max_message_size = parse("BROKERD_MAX_MESSAGE_SIZE", &optional(env, "BROKERD_MAX_MESSAGE_SIZE", "10485760"))?;
    let requests_per_second = parse("BROKERD_RATE_LIMIT_RPS", &optional(env, "BROKERD_RATE_LIMIT_RPS", "20"))?;
    let burst = parse("BROKERD_RATE_LIMIT_BURST", &optional(env, "BROKERD_RATE_LIMIT_BURST", "40"))?;
    let auto_discover_backends =
        parse("BROKERD_AUTO_DISCOVER_BACKENDS", &optional(env, "BROKERD_AUTO_DISCOVER_BACKENDS", "true"))?;

    Ok(GatewayConfig {
        port,
        bearer_token,
        hosted_mode,
        credential_master_key,
        idle_timeout: Duration::from_secs(idle_timeout_secs),
        rpc_timeout: Duration::from_secs(rpc_timeout_secs),
        max_concurrent_sessions,
        max_message_size,
        rate_limit: RateLimitConfig { requests_per_second, burst },
        auto_discover_backends,
    })
}
