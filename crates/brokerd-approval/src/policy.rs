//! Hosted-auth policy (spec §4.8).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ApprovalError, ApprovalResult};

/// How a session's backend is authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// No authentication material; the backend relies on its own
    /// ambient credentials.
    None,
    /// A caller-supplied key, used directly and never persisted.
    InlineKey,
    /// A credential id resolved from the encrypted credential store.
    StoredKey,
    /// Interactive, browser-based login (e.g. ChatGPT-style OAuth).
    Interactive,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::InlineKey => "inline-key",
            Self::StoredKey => "stored-key",
            Self::Interactive => "interactive",
        };
        f.write_str(s)
    }
}

/// Where the API key for an `inline-key`/`stored-key` session comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKeyRef {
    /// Fetched and decrypted from the encrypted credential store.
    Stored,
    /// Supplied directly in the creation request.
    Inline,
    /// No key; backend-owned persistent credentials are used.
    None,
}

/// The `auth` block of a session-creation request (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// The chosen auth mode.
    pub mode: AuthMode,
    /// Informational identifier for the provider (not policy-relevant).
    pub provider_key: Option<String>,
    /// Where the key comes from.
    pub api_key_ref: ApiKeyRef,
    /// The key itself, when `api_key_ref = inline`.
    pub api_key: Option<String>,
    /// The credential id, when `api_key_ref = stored`.
    pub stored_credential_id: Option<String>,
}

/// Deployment-wide hosted-auth policy: which auth modes are enabled.
///
/// A self-hosted deployment typically enables every mode; a hosted
/// multi-tenant deployment disables `interactive` (spec §4.8: "the SDK
/// backend that requires interactive ChatGPT-style login is blocked").
#[derive(Debug, Clone)]
pub struct HostedAuthPolicy {
    disabled_modes: Vec<AuthMode>,
}

impl Default for HostedAuthPolicy {
    /// Self-hosted default: every auth mode is enabled.
    fn default() -> Self {
        Self { disabled_modes: Vec::new() }
    }
}

impl HostedAuthPolicy {
    /// The policy applied when running as a hosted, multi-tenant
    /// deployment: interactive login is blocked.
    #[must_use]
    pub fn hosted() -> Self {
        Self { disabled_modes: vec![AuthMode::Interactive] }
    }

    /// Validate a creation request's `auth` block and `env` map.
    ///
    /// # Errors
    ///
    /// [`ApprovalError::AuthModeDisabled`] if `auth.mode` is disabled;
    /// [`ApprovalError::EnvVarNotPermitted`] if `env` carries an agent
    /// secret the mode doesn't authorise.
    pub fn validate(&self, auth: &AuthRequest, env: Option<&HashMap<String, String>>) -> ApprovalResult<()> {
        if self.disabled_modes.contains(&auth.mode) {
            return Err(ApprovalError::AuthModeDisabled { mode: auth.mode.to_string() });
        }

        if let Some(env) = env {
            for name in env.keys() {
                if is_agent_secret(name) && !auth_mode_authorises_env(auth.mode) {
                    return Err(ApprovalError::EnvVarNotPermitted {
                        name: name.clone(),
                        mode: auth.mode.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Whether an environment variable name looks like an agent-provider
/// secret that should not be smuggled through the generic `env` map.
fn is_agent_secret(name: &str) -> bool {
    name.ends_with("_API_KEY") || name.starts_with("GOOGLE_") || name.starts_with("GCLOUD_")
}

/// Only an explicit `inline-key` or `stored-key` auth mode authorises
/// passing agent secrets through the `env` map; `none` and `interactive`
/// never do, since those modes' authentication material comes from
/// elsewhere (spec §4.8).
fn auth_mode_authorises_env(mode: AuthMode) -> bool {
    matches!(mode, AuthMode::InlineKey | AuthMode::StoredKey)
}
