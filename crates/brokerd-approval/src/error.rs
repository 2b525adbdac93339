//! Errors from permission mediation and hosted-auth policy.

/// Errors that can occur while resolving a permission request or
/// validating a session-creation request against hosted-auth policy.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A client tried to answer, or cancel, a tool-call id with no open
    /// entry in the pending-permission table (spec §4.7 step 5).
    #[error("no pending permission request for tool call {tool_call_id}")]
    NoPendingPermission {
        /// The tool-call id the client referenced.
        tool_call_id: String,
    },

    /// The client's chosen `optionId` was not one of the options presented
    /// when the permission request was opened.
    #[error("option {option_id} is not valid for tool call {tool_call_id}")]
    UnknownOption {
        /// The tool-call id being answered.
        tool_call_id: String,
        /// The option id the client supplied.
        option_id: String,
    },

    /// An `*_API_KEY` or Google-Cloud environment variable was supplied in
    /// a creation request's `env` map without the auth mode authorising it
    /// (spec §4.8).
    #[error("environment variable {name} is not permitted under auth mode {mode}")]
    EnvVarNotPermitted {
        /// The rejected variable name.
        name: String,
        /// The auth mode that rejected it.
        mode: String,
    },

    /// The requested auth mode is disabled for this deployment (spec §4.8:
    /// interactive ChatGPT-style login is blocked in hosted mode).
    #[error("auth mode {mode} is disabled in this deployment")]
    AuthModeDisabled {
        /// The disabled mode.
        mode: String,
    },

    /// A `stored-key` auth request referenced a credential id the
    /// encrypted store does not have.
    #[error("stored credential {credential_id} not found")]
    CredentialNotFound {
        /// The requested credential id.
        credential_id: String,
    },

    /// The stored credential could not be decrypted (wrong master key, or
    /// a tampered envelope).
    #[error("failed to decrypt stored credential {credential_id}")]
    CredentialDecryptionFailed {
        /// The credential id that failed to decrypt.
        credential_id: String,
    },
}

/// Result alias for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
