//! Session error types (spec §4.2, §4.3, §4.5, §7).

use thiserror::Error;

/// Errors that can occur while driving a session or the session
/// registry.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The handshake (`initialize` / `session/new`) failed; the session
    /// never advances past `Initialising`.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Spawning the backend process failed.
    #[error("failed to spawn backend: {0}")]
    SpawnFailed(String),

    /// The child process exited; fatal for the owning session.
    #[error("child process exited (code: {code:?}, signal: {signal:?})")]
    ChildExited {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Terminating signal, if killed by one.
        signal: Option<i32>,
    },

    /// A second prompt was sent while one was already processing.
    #[error("prompt already processing")]
    PromptAlreadyProcessing,

    /// An outbound backend request did not receive a response in time.
    #[error("request timeout")]
    RequestTimeout,

    /// The session was idle past the configured idle timeout.
    #[error("session idle timeout")]
    IdleTimeout,

    /// An operation was attempted on a session that has terminated.
    #[error("session terminated")]
    SessionTerminated,

    /// No session exists for the given id.
    #[error("session not found")]
    SessionNotFound,

    /// A resumable record was missing fields required to reconstruct it.
    #[error("session is not resumable: {0}")]
    NotResumable(String),

    /// The session manager is already at `maxConcurrentSessions`.
    #[error("max concurrent sessions reached")]
    MaxSessionsReached,

    /// An information cache (`supportedModels`, `accountInfo`, ...) was
    /// queried with no live query and no cached value (spec §4.3).
    #[error("no active query — send a prompt first")]
    NoActiveQuery,

    /// The backend (or client) invoked a method the session does not
    /// serve.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Wire-framing violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] brokerd_protocol::ProtocolError),

    /// Permission-table error (unknown tool-call id, bad option).
    #[error("approval error: {0}")]
    Approval(#[from] brokerd_approval::ApprovalError),

    /// Working-directory resolution failed.
    #[error("workspace error: {0}")]
    Workspace(#[from] brokerd_workspace::WorkspaceError),

    /// A filesystem or terminal operation failed.
    #[error("terminal error: {0}")]
    Terminal(#[from] brokerd_terminal::TerminalError),

    /// The in-process SDK reported an error.
    #[error("sdk error: {0}")]
    Sdk(#[from] brokerd_sdk::SdkError),

    /// The persistence layer reported an error.
    #[error("storage error: {0}")]
    Storage(#[from] brokerd_storage::StorageError),

    /// Credential decryption failed.
    #[error("credential error: {0}")]
    Crypto(#[from] brokerd_crypto::CryptoError),

    /// An underlying I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for conditions not covered above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether a client retrying this exact operation later might
    /// succeed (spec §4.5: "fails with a retriable error").
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::MaxSessionsReached | Self::RequestTimeout)
    }
}

/// Result alias used throughout session handling.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_sessions_reached_is_retriable() {
        assert!(SessionError::MaxSessionsReached.is_retriable());
        assert!(!SessionError::SessionNotFound.is_retriable());
    }

    #[test]
    fn no_active_query_matches_spec_wording() {
        assert_eq!(SessionError::NoActiveQuery.to_string(), "no active query — send a prompt first");
    }
}
