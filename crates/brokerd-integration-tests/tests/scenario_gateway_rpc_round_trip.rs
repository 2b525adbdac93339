//! Gateway-level round trip: `POST /v1/sessions` followed by
//! `POST /v1/sessions/:id/rpc` (spec §6's HTTP surface), driven the
//! way `brokerd_gateway::server`'s own tests drive the router
//! (`tower::ServiceExt::oneshot`), but over the shared [`common`]
//! fixture so it exercises the full `AppState` wiring rather than a
//! one-off test state.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use brokerd_gateway::server::router;
use brokerd_test::ScriptedSdkClient;
use common::{gateway_state, BEARER_TOKEN};
use tower::ServiceExt;

#[tokio::test]
async fn creating_a_session_then_sending_a_prompt_over_http_round_trips() {
    let sdk_client = Arc::new(ScriptedSdkClient::default());
    let app = router(gateway_state(sdk_client.clone()));

    let create_body = serde_json::json!({
        "auth": {"mode": "none", "apiKeyRef": "none"},
        "workingDirectory": {"kind": "workspace_id", "id": "ws-1"},
        "launch": {"kind": "sdk"},
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/sessions")
                .header("authorization", format!("Bearer {BEARER_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(create_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_string();

    let prompt_body = serde_json::json!({"type": "send_prompt", "text": "hi"});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/sessions/{session_id}/rpc"))
                .header("authorization", format!("Bearer {BEARER_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(prompt_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let result: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(result["stopReason"], "end_turn");

    assert!(sdk_client.was_queried());
    assert_eq!(sdk_client.last_prompt().await, Some("hi".to_string()));
}

#[tokio::test]
async fn a_request_without_a_bearer_token_is_rejected_before_it_ever_reaches_session_manager() {
    let sdk_client = Arc::new(ScriptedSdkClient::default());
    let app = router(gateway_state(sdk_client));

    let response = app
        .oneshot(Request::builder().uri("/v1/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
