//! Shared error taxonomy.
//!
//! Mirrors the structured outcome categories of the session-runtime spec:
//! protocol, backend, timeout, resource, permission, and policy errors.
//! Individual crates wrap this (or define their own narrower enum and
//! convert into it at the gateway boundary) rather than passing plain
//! strings across crate edges.

use thiserror::Error;

/// Errors that can occur anywhere in the session runtime.
#[derive(Debug, Error)]
pub enum GatewayError {
    // --- Protocol errors ---
    /// A line failed to parse as JSON, lacked `jsonrpc: "2.0"`, or otherwise
    /// violated the wire framing.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// An encoded outbound message exceeded the configured byte cap.
    #[error("message exceeds max size ({actual} > {limit} bytes)")]
    MessageTooLarge {
        /// Encoded size of the message that was rejected.
        actual: usize,
        /// Configured cap.
        limit: usize,
    },

    /// The backend (or client) invoked a method the session does not serve.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    // --- Backend errors ---
    /// Spawning the child process failed.
    #[error("failed to spawn backend: {0}")]
    SpawnFailed(String),

    /// The child process exited (expectedly or not); fatal for the session.
    #[error("child process exited (code: {code:?}, signal: {signal:?})")]
    ChildExited {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Terminating signal, if killed by one.
        signal: Option<i32>,
    },

    // --- Timeout errors ---
    /// An outbound backend request did not receive a response in time.
    #[error("request timeout")]
    RequestTimeout,

    /// The session was idle past the configured idle timeout.
    #[error("session idle timeout")]
    IdleTimeout,

    // --- Resource errors ---
    /// The session manager is already at `maxConcurrentSessions`.
    #[error("max concurrent sessions reached")]
    MaxSessionsReached,

    /// Decrypting a stored credential failed.
    #[error("credential decryption failed: {0}")]
    CredentialDecryptionFailed(String),

    // --- Permission errors ---
    /// A response arrived for a tool-call id with no open pending entry.
    #[error("no pending permission request")]
    NoPendingPermission,

    // --- Policy errors ---
    /// An environment variable was rejected by the hosted-auth policy.
    #[error("environment variable not permitted in this auth mode: {0}")]
    EnvVarNotPermitted(String),

    /// The requested auth mode is disabled under hosted-mode policy.
    #[error("auth mode disabled in hosted mode: {0}")]
    AuthModeDisabled(String),

    // --- Session state errors ---
    /// A second prompt was sent while one was already processing.
    #[error("prompt already processing")]
    PromptAlreadyProcessing,

    /// An operation was attempted on a session that has terminated.
    #[error("session terminated")]
    SessionTerminated,

    /// No session exists for the given id.
    #[error("session not found")]
    SessionNotFound,

    /// A resumable record was missing fields required to reconstruct it.
    #[error("session is not resumable: {0}")]
    NotResumable(String),

    // --- I/O / persistence ---
    /// An underlying I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persistence layer reported an error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all for conditions not covered above.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_exited_formats_both_fields() {
        let err = GatewayError::ChildExited {
            code: Some(137),
            signal: None,
        };
        assert_eq!(
            err.to_string(),
            "child process exited (code: Some(137), signal: None)"
        );
    }

    #[test]
    fn message_too_large_reports_both_sizes() {
        let err = GatewayError::MessageTooLarge {
            actual: 300_000,
            limit: 262_144,
        };
        assert!(err.to_string().contains("300000"));
        assert!(err.to_string().contains("262144"));
    }
}
