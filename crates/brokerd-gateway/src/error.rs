//! The gateway's HTTP-boundary error mapping (spec §7).
//!
//! Every crate below this one owns a narrow `thiserror` enum; this module
//! is where those enums convert into [`brokerd_core::GatewayError`] (the
//! shared taxonomy) and that in turn into an HTTP status plus the
//! structured JSON body spec §7 calls for, so a client never sees a bare
//! string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use brokerd_core::GatewayError;
use serde::Serialize;

use brokerd_approval::ApprovalError;
use brokerd_config::ConfigError;
use brokerd_session::SessionError;
use brokerd_storage::StorageError;
use brokerd_workspace::WorkspaceError;

/// The gateway's own result alias.
pub type GatewayApiResult<T> = Result<T, GatewayApiError>;

/// A [`GatewayError`] with enough of its own context to render an HTTP
/// response (status code, stable string code, message).
#[derive(Debug)]
pub struct GatewayApiError(GatewayError);

impl From<GatewayError> for GatewayApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for GatewayApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for GatewayApiError {}

impl From<SessionError> for GatewayApiError {
    fn from(err: SessionError) -> Self {
        Self(session_to_gateway(err))
    }
}

impl From<ApprovalError> for GatewayApiError {
    fn from(err: ApprovalError) -> Self {
        Self(approval_to_gateway(err))
    }
}

impl From<WorkspaceError> for GatewayApiError {
    fn from(err: WorkspaceError) -> Self {
        Self(GatewayError::Internal(err.to_string()))
    }
}

impl From<StorageError> for GatewayApiError {
    fn from(err: StorageError) -> Self {
        Self(GatewayError::Storage(err.to_string()))
    }
}

impl From<ConfigError> for GatewayApiError {
    fn from(err: ConfigError) -> Self {
        Self(GatewayError::Internal(err.to_string()))
    }
}

/// `SessionError` wraps `ApprovalError`/`WorkspaceError`/`TerminalError`/
/// `SdkError`/`StorageError`/`CryptoError`/`io::Error` via `#[from]`, so
/// flattening it to `GatewayError` is mostly a one-to-one variant match;
/// the wrapped-crate variants fall back to `Internal` since their own
/// taxonomies don't line up one-to-one with spec §7's list.
fn session_to_gateway(err: SessionError) -> GatewayError {
    match err {
        SessionError::HandshakeFailed(reason) => GatewayError::SpawnFailed(reason),
        SessionError::SpawnFailed(reason) => GatewayError::SpawnFailed(reason),
        SessionError::ChildExited { code, signal } => GatewayError::ChildExited { code, signal },
        SessionError::PromptAlreadyProcessing => GatewayError::PromptAlreadyProcessing,
        SessionError::RequestTimeout => GatewayError::RequestTimeout,
        SessionError::IdleTimeout => GatewayError::IdleTimeout,
        SessionError::SessionTerminated => GatewayError::SessionTerminated,
        SessionError::SessionNotFound => GatewayError::SessionNotFound,
        SessionError::NotResumable(reason) => GatewayError::NotResumable(reason),
        SessionError::MaxSessionsReached => GatewayError::MaxSessionsReached,
        SessionError::MethodNotFound(method) => GatewayError::MethodNotFound(method),
        SessionError::Approval(inner) => approval_to_gateway(inner),
        SessionError::Io(inner) => GatewayError::Io(inner),
        other => GatewayError::Internal(other.to_string()),
    }
}

fn approval_to_gateway(err: ApprovalError) -> GatewayError {
    match err {
        ApprovalError::NoPendingPermission { .. } => GatewayError::NoPendingPermission,
        ApprovalError::EnvVarNotPermitted { name, .. } => GatewayError::EnvVarNotPermitted(name),
        ApprovalError::AuthModeDisabled { mode } => GatewayError::AuthModeDisabled(mode),
        ApprovalError::CredentialDecryptionFailed { credential_id } => {
            GatewayError::CredentialDecryptionFailed(credential_id)
        },
        other => GatewayError::Internal(other.to_string()),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    retriable: bool,
}

fn classify(err: &GatewayError) -> (StatusCode, &'static str, bool) {
    match err {
        GatewayError::MalformedMessage(_) => (StatusCode::BAD_REQUEST, "malformed_message", false),
        GatewayError::MessageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "message_too_large", false),
        GatewayError::MethodNotFound(_) => (StatusCode::NOT_FOUND, "method_not_found", false),
        GatewayError::SpawnFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "spawn_failed", false),
        GatewayError::ChildExited { .. } => (StatusCode::GONE, "child_exited", false),
        GatewayError::RequestTimeout => (StatusCode::GATEWAY_TIMEOUT, "request_timeout", true),
        GatewayError::IdleTimeout => (StatusCode::GONE, "idle_timeout", false),
        GatewayError::MaxSessionsReached => (StatusCode::TOO_MANY_REQUESTS, "max_sessions_reached", true),
        GatewayError::CredentialDecryptionFailed(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "credential_decryption_failed", false)
        },
        GatewayError::NoPendingPermission => (StatusCode::CONFLICT, "no_pending_permission", false),
        GatewayError::EnvVarNotPermitted(_) => (StatusCode::FORBIDDEN, "env_var_not_permitted", false),
        GatewayError::AuthModeDisabled(_) => (StatusCode::FORBIDDEN, "auth_mode_disabled", false),
        GatewayError::PromptAlreadyProcessing => (StatusCode::CONFLICT, "prompt_already_processing", false),
        GatewayError::SessionTerminated => (StatusCode::GONE, "session_terminated", false),
        GatewayError::SessionNotFound => (StatusCode::NOT_FOUND, "session_not_found", false),
        GatewayError::NotResumable(_) => (StatusCode::CONFLICT, "not_resumable", false),
        GatewayError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", false),
        GatewayError::Json(_) => (StatusCode::BAD_REQUEST, "malformed_message", false),
        GatewayError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", false),
        GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", false),
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        let (status, code, retriable) = classify(&self.0);
        tracing::warn!(code, %status, "request failed: {}", self.0);
        let body = ErrorBody { error: ErrorDetail { code, message: self.0.to_string(), retriable } };
        (status, Json(body)).into_response()
    }
}
