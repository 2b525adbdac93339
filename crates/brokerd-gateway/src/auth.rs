//! Bearer-token authentication middleware (spec §6: "Authentication is
//! a bearer token except on health endpoints").

use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Reject any request whose `Authorization: Bearer <token>` header does
/// not match [`GatewayConfig::bearer_token`]. Registered only on the
/// router branch covering `/v1/*`; `/healthz` and `/readyz` never pass
/// through this layer.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == state.config.bearer_token.expose() => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use brokerd_config::GatewayConfig;
    use brokerd_core::Secret;
    use brokerd_crypto::MasterKey;
    use brokerd_sdk::{PermissionCallback, SdkClient, SdkError, SdkQuery, SdkQueryOptions, SdkResult};
    use brokerd_session::{SessionManager, SessionManagerDeps};
    use brokerd_storage::adapter::KvPersistenceAdapter;
    use brokerd_workspace::{WorkspaceResult, WorktreeManager};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    use crate::credentials::KvCredentialStore;

    struct AlwaysCwdWorktreeManager;

    #[async_trait]
    impl WorktreeManager for AlwaysCwdWorktreeManager {
        async fn prepare(&self, _workspace_id: &str) -> WorkspaceResult<PathBuf> {
            Ok(PathBuf::from("."))
        }
    }

    struct RefusingSdkClient;

    #[async_trait]
    impl SdkClient for RefusingSdkClient {
        async fn query(&self, _prompt: String, _options: SdkQueryOptions, _cb: PermissionCallback) -> SdkResult<SdkQuery> {
            Err(SdkError::QueryStartFailed("no SDK configured in this test".into()))
        }
    }

    fn state_with_token(token: &str) -> AppState {
        let config = GatewayConfig {
            port: 0,
            bearer_token: Secret::new(token),
            hosted_mode: false,
            credential_master_key: Secret::new("test-key"),
            idle_timeout: Duration::from_secs(600),
            rpc_timeout: Duration::from_secs(300),
            max_concurrent_sessions: 50,
            max_message_size: 1_000_000,
            rate_limit: brokerd_config::RateLimitConfig { requests_per_second: 10, burst: 20 },
            auto_discover_backends: false,
        };
        let master_key = Arc::new(MasterKey::new("test-key"));
        let kv = Arc::new(brokerd_storage::kv::MemoryKvStore::new());
        let credentials = Arc::new(KvCredentialStore::new(Arc::clone(&kv) as _, Arc::clone(&master_key)));
        let deps = SessionManagerDeps::new(
            Arc::new(KvPersistenceAdapter::new(kv)),
            credentials.clone(),
            master_key,
            Arc::new(AlwaysCwdWorktreeManager),
            Arc::new(RefusingSdkClient),
        );
        AppState {
            sessions: Arc::new(SessionManager::new(deps)),
            config: Arc::new(config),
            credentials,
            started_at: Instant::now(),
            discovered_backends: Arc::new(Vec::new()),
        }
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/v1/probe", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state.clone(), require_bearer_token))
            .with_state(state)
    }

    #[tokio::test]
    async fn a_matching_bearer_token_is_admitted() {
        let state = state_with_token("secret123");
        let response = app(state)
            .oneshot(Request::builder().uri("/v1/probe").header("authorization", "Bearer secret123").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn a_missing_header_is_rejected() {
        let state = state_with_token("secret123");
        let response =
            app(state).oneshot(Request::builder().uri("/v1/probe").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn a_mismatched_token_is_rejected() {
        let state = state_with_token("secret123");
        let response = app(state)
            .oneshot(Request::builder().uri("/v1/probe").header("authorization", "Bearer wrong").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
