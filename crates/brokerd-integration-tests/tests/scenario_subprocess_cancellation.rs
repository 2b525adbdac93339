//! End-to-end scenario 3: cancellation (spec §8).
//!
//! While a prompt is in flight, the client cancels it. The backend
//! receives `session/cancel` and only then completes the pending
//! `session/prompt` request with `stopReason: "cancelled"`.

use std::path::PathBuf;
use std::sync::Arc;

use brokerd_core::SessionId;
use brokerd_events::{Fanout, SessionEvent};
use brokerd_protocol::StopReason;
use brokerd_session::{SessionError, SubprocessSession};
use brokerd_test::{in_memory_deps, spawn_cancellable_backend, spawn_permission_flow_backend, FakeChildController};

#[tokio::test]
async fn cancelling_a_prompt_completes_it_as_cancelled() {
    let (gateway_side, backend_side) = tokio::io::duplex(16 * 1024);
    spawn_cancellable_backend(backend_side);
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

    let prompt = {
        let session = session.clone();
        tokio::spawn(async move { session.send_prompt("hello").await })
    };

    // Wait until the prompt has actually been written to the backend
    // before cancelling it, so `session/cancel` cannot race ahead of
    // `session/prompt` on the wire.
    while session.state().await != brokerd_storage::SessionState::Processing {
        tokio::task::yield_now().await;
    }
    session.cancel_prompt().await.unwrap();

    let stop_reason = prompt.await.unwrap().unwrap();
    assert_eq!(stop_reason, StopReason::Cancelled);
}

/// Cancelling a prompt also resolves any permission request the backend
/// is still blocked on, purely locally — the backend here never
/// addresses it (spec §4.2: "the session should also actively cancel
/// them locally").
#[tokio::test]
async fn cancelling_a_prompt_also_cancels_an_open_permission_request_locally() {
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
    {
        let session = session.clone();
        tokio::spawn(async move { let _ = session.send_prompt("hello").await; });
    }

    let tool_call_id = loop {
        match events.recv().await.unwrap() {
            SessionEvent::PermissionRequest { tool_call_id, .. } => break tool_call_id,
            _ => continue,
        }
    };
    assert_eq!(tool_call_id, "T1");

    session.cancel_prompt().await.unwrap();

    let resolved = session.resolve_permission(&tool_call_id, Some("ok".to_string()), None).await;
    assert!(matches!(resolved, Err(SessionError::Approval(_))));
}
