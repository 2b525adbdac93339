//! End-to-end scenario 1: happy-path subprocess prompt (spec §8).
//!
//! Create a subprocess-backed session, send one prompt, and confirm
//! the subscriber sees exactly one `session_update` followed by the
//! final `end_turn` completion, with no pending requests left behind.

use std::path::PathBuf;

use brokerd_core::{BackendId, SessionId};
use brokerd_events::{Fanout, SessionEvent};
use brokerd_protocol::StopReason;
use brokerd_session::SubprocessSession;
use brokerd_test::{in_memory_deps, spawn_happy_path_backend, FakeChildController};

#[tokio::test]
async fn happy_path_prompt_emits_one_update_then_completes() {
    let (gateway_side, backend_side) = tokio::io::duplex(16 * 1024);
    spawn_happy_path_backend(backend_side);
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

    assert_eq!(session.backend_id().await, Some(BackendId::new("backend-session-1")));

    let (_token, mut events) = fanout.subscribe(16).await;
    let stop_reason = session.send_prompt("hello").await.unwrap();
    assert_eq!(stop_reason, StopReason::EndTurn);

    // `session/update` arrives amid `activity` touches the reader task
    // fires on every line it reads; skip those to find it.
    let payload = loop {
        match events.recv().await.unwrap() {
            SessionEvent::SessionUpdate { payload, .. } => break payload,
            SessionEvent::Activity { .. } => continue,
            other => panic!("unexpected event before session_update: {other:?}"),
        }
    };
    assert_eq!(payload["sessionUpdate"], "agent_message_chunk");
    assert_eq!(payload["text"], "hi");

    assert_eq!(session.state().await, brokerd_storage::SessionState::Ready);
}
