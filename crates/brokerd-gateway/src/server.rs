//! The axum router and its handlers (spec §6's endpoint table, minus
//! the `/v1/workspaces/*` rows the table itself marks "(external)").

use std::convert::Infallible;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use brokerd_core::SessionId;
use brokerd_events::SessionEvent;
use futures::stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::auth::require_bearer_token;
use crate::error::{GatewayApiError, GatewayApiResult};
use crate::health::{liveness, readiness};
use crate::state::AppState;
use crate::wire::{
    ControlMessage, CreateSessionBody, CredentialListBody, ResumableSessionBody, SessionInfoBody,
    SessionListBody, StoreCredentialBody,
};

const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
const SUBSCRIBER_CAPACITY: usize = 64;

/// Build the full router, with bearer-token auth wrapping every
/// `/v1/*` route and the two health endpoints left open.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/connect", post(connect_session))
        .route("/sessions/resumable", get(list_resumable_sessions))
        .route("/sessions/:id/rpc", post(session_rpc))
        .route("/sessions/:id/events", get(session_events))
        .route("/sessions/:id/ws", get(session_ws))
        .route("/credentials", post(store_credential).get(list_credentials))
        .route("/credentials/:id", delete(delete_credential))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_bearer_token));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/v1", v1)
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(liveness(state.uptime(), CRATE_VERSION))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let live = state.sessions.list().await.len();
    let status = readiness(
        true,
        &state.discovered_backends,
        true,
        live,
        state.config.max_concurrent_sessions,
        state.uptime(),
        CRATE_VERSION,
    )
    .await;
    let code = if status.is_healthy() { axum::http::StatusCode::OK } else { axum::http::StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(status))
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> GatewayApiResult<Json<SessionInfoBody>> {
    let handle = state.sessions.create(body.into()).await?;
    Ok(Json(SessionInfoBody { session_id: handle.session_id, state: handle.state, restored: handle.restored }))
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListBody> {
    let sessions = state
        .sessions
        .list()
        .await
        .into_iter()
        .map(|h| SessionInfoBody { session_id: h.session_id, state: h.state, restored: h.restored })
        .collect();
    Json(SessionListBody { sessions })
}

async fn get_session(State(state): State<AppState>, Path(id): Path<SessionId>) -> GatewayApiResult<Json<SessionInfoBody>> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(SessionInfoBody { session_id: handle.session_id, state: handle.state, restored: handle.restored }))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<SessionId>) -> GatewayApiResult<axum::http::StatusCode> {
    state.sessions.delete(id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn connect_session(State(state): State<AppState>, Path(id): Path<SessionId>) -> GatewayApiResult<Json<SessionInfoBody>> {
    let handle = state.sessions.connect(id).await?;
    Ok(Json(SessionInfoBody { session_id: handle.session_id, state: handle.state, restored: handle.restored }))
}

async fn list_resumable_sessions(State(state): State<AppState>) -> GatewayApiResult<Json<Vec<ResumableSessionBody>>> {
    let records = state.sessions.list_resumable().await?;
    Ok(Json(records.into_iter().map(ResumableSessionBody::from).collect()))
}

/// `POST /v1/sessions/:id/rpc`: dispatch one typed control message and
/// reply with its JSON result (spec §4.6's non-streaming branch).
async fn session_rpc(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(message): Json<ControlMessage>,
) -> GatewayApiResult<Json<serde_json::Value>> {
    dispatch(&state, id, message).await.map(Json)
}

async fn dispatch(state: &AppState, id: SessionId, message: ControlMessage) -> GatewayApiResult<serde_json::Value> {
    let sessions = &state.sessions;
    let value = match message {
        ControlMessage::SendPrompt { text, options } => {
            let stop_reason = sessions.send_prompt(id, text, options).await?;
            serde_json::json!({ "stopReason": stop_reason })
        },
        ControlMessage::CancelPrompt => {
            sessions.cancel_prompt(id).await?;
            serde_json::Value::Null
        },
        ControlMessage::ResolvePermission { tool_call_id, option_id, answers } => {
            sessions.resolve_permission(id, &tool_call_id, option_id, answers).await?;
            serde_json::Value::Null
        },
        ControlMessage::CancelPermission { tool_call_id } => {
            sessions.cancel_permission(id, &tool_call_id).await?;
            serde_json::Value::Null
        },
        ControlMessage::GetSupportedModels => serde_json::to_value(sessions.supported_models(id).await?)
            .map_err(|e| GatewayApiError::from(brokerd_session::SessionError::Internal(e.to_string())))?,
        ControlMessage::GetAccountInfo => serde_json::to_value(sessions.account_info(id).await?)
            .map_err(|e| GatewayApiError::from(brokerd_session::SessionError::Internal(e.to_string())))?,
        ControlMessage::GetMcpServerStatus => serde_json::to_value(sessions.mcp_server_status(id).await?)
            .map_err(|e| GatewayApiError::from(brokerd_session::SessionError::Internal(e.to_string())))?,
        ControlMessage::GetSupportedCommands => serde_json::to_value(sessions.supported_commands(id).await?)
            .map_err(|e| GatewayApiError::from(brokerd_session::SessionError::Internal(e.to_string())))?,
        ControlMessage::SetPermissionMode { mode } => {
            sessions.set_permission_mode(id, &mode).await?;
            serde_json::Value::Null
        },
        ControlMessage::SetModel { model } => {
            sessions.set_model(id, &model).await?;
            serde_json::Value::Null
        },
        ControlMessage::SetMaxThinkingTokens { max_thinking_tokens } => {
            sessions.set_max_thinking_tokens(id, max_thinking_tokens).await?;
            serde_json::Value::Null
        },
        ControlMessage::SetMcpServers { mcp_servers } => {
            let servers = serde_json::to_value(mcp_servers)
                .map_err(|e| GatewayApiError::from(brokerd_session::SessionError::Internal(e.to_string())))?;
            sessions.set_mcp_servers(id, servers).await?;
            serde_json::Value::Null
        },
        ControlMessage::RewindFiles { checkpoint_id } => {
            sessions.rewind_files(id, &checkpoint_id).await?;
            serde_json::Value::Null
        },
        ControlMessage::UpdateConfig { config } => {
            sessions.update_config(id, config).await?;
            serde_json::Value::Null
        },
    };
    Ok(value)
}

/// `GET /v1/sessions/:id/events`: the SSE branch of spec §4.6's
/// fan-out, one `SessionEvent` per `data:` frame.
async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> GatewayApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (_token, receiver) = state.sessions.subscribe(id, SUBSCRIBER_CAPACITY).await?;
    let stream = ReceiverStream::new(receiver).map(|event: SessionEvent| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /v1/sessions/:id/ws`: the `WebSocket` branch of spec §4.6.
/// Inbound text frames are tried as typed control messages first (spec
/// §4.6's second frame shape); anything that doesn't parse as one is
/// relayed verbatim as a raw JSON-RPC frame to a subprocess-backed
/// session's stdin (spec §4.6(a)) and rejected for SDK-backed sessions.
/// Outbound frames are `SessionEvent`s from the fan-out.
async fn session_ws(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    ws: WebSocketUpgrade,
) -> GatewayApiResult<axum::response::Response> {
    state.sessions.get(id).await?;
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, id)))
}

async fn handle_ws(mut socket: WebSocket, state: AppState, id: SessionId) {
    let Ok((token, mut receiver)) = state.sessions.subscribe(id, SUBSCRIBER_CAPACITY).await else {
        let _ = socket.close().await;
        return;
    };

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    WsMessage::Text(text) => {
                        let reply = match serde_json::from_str::<ControlMessage>(&text) {
                            Ok(control) => dispatch(&state, id, control).await,
                            Err(_) => state.sessions.send_raw_frame(id, &text).await.map(|()| serde_json::Value::Null).map_err(GatewayApiError::from),
                        };
                        let payload = match reply {
                            Ok(value) => value,
                            Err(err) => serde_json::json!({"error": err.to_string()}),
                        };
                        if let Ok(text) = serde_json::to_string(&payload) {
                            if socket.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    state.sessions.unsubscribe(id, token).await;
}

async fn store_credential(
    State(state): State<AppState>,
    Json(body): Json<StoreCredentialBody>,
) -> GatewayApiResult<axum::http::StatusCode> {
    state.credentials.store(&body.credential_id, &body.plaintext).await?;
    Ok(axum::http::StatusCode::CREATED)
}

async fn list_credentials(State(state): State<AppState>) -> GatewayApiResult<Json<CredentialListBody>> {
    let credential_ids = state.credentials.list().await?;
    Ok(Json(CredentialListBody { credential_ids }))
}

async fn delete_credential(State(state): State<AppState>, Path(id): Path<String>) -> GatewayApiResult<axum::http::StatusCode> {
    let existed = state.credentials.delete(&id).await?;
    Ok(if existed { axum::http::StatusCode::NO_CONTENT } else { axum::http::StatusCode::NOT_FOUND })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use brokerd_config::GatewayConfig;
    use brokerd_core::Secret;
    use brokerd_crypto::MasterKey;
    use brokerd_sdk::{PermissionCallback, SdkClient, SdkError, SdkQuery, SdkQueryOptions, SdkResult};
    use brokerd_session::{SessionManager, SessionManagerDeps};
    use brokerd_storage::adapter::KvPersistenceAdapter;
    use brokerd_storage::kv::MemoryKvStore;
    use brokerd_workspace::{WorkspaceResult, WorktreeManager};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    use crate::credentials::KvCredentialStore;

    struct AlwaysTempDirWorktreeManager;

    #[async_trait]
    impl WorktreeManager for AlwaysTempDirWorktreeManager {
        async fn prepare(&self, _workspace_id: &str) -> WorkspaceResult<PathBuf> {
            Ok(std::env::temp_dir())
        }
    }

    struct RefusingSdkClient;

    #[async_trait]
    impl SdkClient for RefusingSdkClient {
        async fn query(&self, _prompt: String, _options: SdkQueryOptions, _cb: PermissionCallback) -> SdkResult<SdkQuery> {
            Err(SdkError::QueryStartFailed("no SDK configured in this test".into()))
        }
    }

    fn test_state() -> AppState {
        let config = GatewayConfig {
            port: 0,
            bearer_token: Secret::new("test-token"),
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
        let kv = Arc::new(MemoryKvStore::new());
        let credentials = Arc::new(KvCredentialStore::new(kv.clone(), master_key.clone()));
        let deps = SessionManagerDeps::new(
            Arc::new(KvPersistenceAdapter::new(kv)),
            credentials.clone(),
            master_key,
            Arc::new(AlwaysTempDirWorktreeManager),
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

    #[tokio::test]
    async fn healthz_needs_no_bearer_token() {
        let app = router(test_state());
        let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_routes_reject_an_unauthenticated_request() {
        let app = router(test_state());
        let response = app.oneshot(Request::builder().uri("/v1/sessions").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_sessions_with_a_valid_token_returns_an_empty_list() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions")
                    .header("authorization", "Bearer test-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deleting_an_unknown_credential_is_reported_as_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/credentials/missing")
                    .header("authorization", "Bearer test-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
