//! Builders for the request/value shapes tests construct most often.

use std::collections::HashMap;
use std::path::PathBuf;

use brokerd_approval::{ApiKeyRef, AuthMode, AuthRequest};
use brokerd_sdk::SdkQueryOptions;
use brokerd_session::{BackendLaunch, CreateSessionRequest};
use brokerd_workspace::WorkingDirectoryRequest;

/// An `auth: { mode: "none" }` request, the common case for tests that
/// don't care about auth resolution.
#[must_use]
pub fn unauthenticated_request() -> AuthRequest {
    AuthRequest { mode: AuthMode::None, provider_key: None, api_key_ref: ApiKeyRef::None, api_key: None, stored_credential_id: None }
}

/// An `auth: { mode: "inline-key" }` request carrying `api_key` directly.
#[must_use]
pub fn inline_key_request(api_key: impl Into<String>) -> AuthRequest {
    AuthRequest {
        mode: AuthMode::InlineKey,
        provider_key: None,
        api_key_ref: ApiKeyRef::None,
        api_key: Some(api_key.into()),
        stored_credential_id: None,
    }
}

/// An `auth: { mode: "stored-key" }` request naming a stored credential.
#[must_use]
pub fn stored_key_request(credential_id: impl Into<String>) -> AuthRequest {
    AuthRequest {
        mode: AuthMode::StoredKey,
        provider_key: None,
        api_key_ref: ApiKeyRef::None,
        api_key: None,
        stored_credential_id: Some(credential_id.into()),
    }
}

/// An `auth: { mode: "interactive" }` request (blocked under a hosted
/// [`brokerd_approval::HostedAuthPolicy`]).
#[must_use]
pub fn interactive_request() -> AuthRequest {
    AuthRequest { mode: AuthMode::Interactive, provider_key: None, api_key_ref: ApiKeyRef::None, api_key: None, stored_credential_id: None }
}

/// A session-creation request for an in-process SDK backend, unauthenticated,
/// rooted at the process's temp directory.
#[must_use]
pub fn sdk_creation_request() -> CreateSessionRequest {
    CreateSessionRequest {
        auth: unauthenticated_request(),
        env: HashMap::new(),
        working_directory: WorkingDirectoryRequest::RepoPath(std::env::temp_dir()),
        launch: BackendLaunch::Sdk { options: SdkQueryOptions::new() },
    }
}

/// A session-creation request for a subprocess backend, unauthenticated,
/// rooted at the process's temp directory.
#[must_use]
pub fn subprocess_creation_request(command: impl Into<String>) -> CreateSessionRequest {
    CreateSessionRequest {
        auth: unauthenticated_request(),
        env: HashMap::new(),
        working_directory: WorkingDirectoryRequest::RepoPath(std::env::temp_dir()),
        launch: BackendLaunch::Subprocess { command: command.into(), args: Vec::new(), mcp_servers: Vec::new() },
    }
}

/// A `workspaceId`-rooted variant of [`sdk_creation_request`].
#[must_use]
pub fn sdk_creation_request_for_workspace(workspace_id: impl Into<String>) -> CreateSessionRequest {
    CreateSessionRequest {
        working_directory: WorkingDirectoryRequest::WorkspaceId(workspace_id.into()),
        ..sdk_creation_request()
    }
}

/// A directory guaranteed not to exist, for exercising
/// `WorkspaceError::InvalidRepoPath`.
#[must_use]
pub fn nonexistent_directory() -> PathBuf {
    std::env::temp_dir().join("brokerd-test-does-not-exist").join(uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_request_carries_no_credential() {
        let auth = unauthenticated_request();
        assert_eq!(auth.mode, AuthMode::None);
        assert!(auth.api_key.is_none());
        assert!(auth.stored_credential_id.is_none());
    }

    #[test]
    fn stored_key_request_carries_the_credential_id() {
        let auth = stored_key_request("cred-1");
        assert_eq!(auth.stored_credential_id, Some("cred-1".to_string()));
    }

    #[test]
    fn nonexistent_directory_is_not_a_directory() {
        assert!(!nonexistent_directory().is_dir());
    }
}
