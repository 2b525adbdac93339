//! End-to-end scenario 2: permission allow (spec §8).
//!
//! During a prompt the backend raises `session/request_permission`
//! for tool call `T1` with options `ok`/`no`; the client answers `ok`,
//! the backend receives `{outcome:{outcome:"selected",optionId:"ok"}}`,
//! and a second reply for the same tool call fails.

use std::path::PathBuf;
use std::sync::Arc;

use brokerd_core::SessionId;
use brokerd_events::{Fanout, SessionEvent};
use brokerd_protocol::StopReason;
use brokerd_session::{SessionError, SubprocessSession};
use brokerd_test::{in_memory_deps, spawn_permission_flow_backend, FakeChildController};

#[tokio::test]
async fn permission_allow_resolves_the_backend_and_rejects_a_second_reply() {
    let (gateway_side, backend_side) = tokio::io::duplex(16 * 1024);
    spawn_permission_flow_backend(backend_side, "T1", "ok", "no");
    let (stdout, stdin) = tokio::io::split(gateway_side);

    let fanout = Fanout::new();
    let session = SubprocessSession::connect::<_, _, tokio::io::DuplexStream>(
        Box::pin(stdin),
        stdout,
        None,
        FakeChildController::new(),
        PathBuf::from("/tmp"),
        vec![],
        in_memory_deps(SessionId::new(), fanout.clone()),
    )
    .await
    .unwrap();
    let session = Arc::new(session);

    let (_token, mut events) = fanout.subscribe(16).await;
    let prompt = {
        let session = session.clone();
        tokio::spawn(async move { session.send_prompt("hello").await })
    };

    let (tool_call_id, options) = loop {
        match events.recv().await.unwrap() {
            SessionEvent::PermissionRequest { tool_call_id, options, .. } => break (tool_call_id, options),
            _ => continue,
        }
    };
    assert_eq!(tool_call_id, "T1");
    let option_ids: Vec<_> = options.iter().map(|o| o["optionId"].as_str().unwrap().to_string()).collect();
    assert_eq!(option_ids, vec!["ok", "no"]);

    session.resolve_permission(&tool_call_id, Some("ok".to_string()), None).await.unwrap();

    let stop_reason = prompt.await.unwrap().unwrap();
    assert_eq!(stop_reason, StopReason::EndTurn);

    let second = session.resolve_permission("T1", Some("ok".to_string()), None).await;
    assert!(matches!(second, Err(SessionError::Approval(_))));
    assert!(second.unwrap_err().to_string().contains("no pending permission request"));
}
