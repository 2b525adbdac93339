//! End-to-end scenario 4: child crash (spec §8).
//!
//! While a `session/prompt` request is pending, the child exits with
//! code 137 and no signal. The pending request fails carrying that
//! exact exit code/signal, the subscriber receives one `exit` event
//! with the same code/signal, and the session transitions to
//! Terminated.
//!
//! `SubprocessSession` serialises every outbound call through one
//! rendezvous slot (`Inner::call`) and refuses a second concurrent
//! `sendPrompt`, so at most one outbound request is ever pending at a
//! time in this architecture; this exercises that single-pending-request
//! case rather than literally three concurrent calls.

use std::path::PathBuf;
use std::sync::Arc;

use brokerd_core::SessionId;
use brokerd_events::{Fanout, SessionEvent};
use brokerd_session::{SessionError, SubprocessSession};
use brokerd_storage::SessionState;
use brokerd_terminal::ExitStatus;
use brokerd_test::{in_memory_deps, spawn_crashing_backend, FakeChildController};

#[tokio::test]
async fn a_child_crash_fails_the_pending_prompt_and_terminates_the_session() {
    let (gateway_side, backend_side) = tokio::io::duplex(16 * 1024);
    spawn_crashing_backend(backend_side);
    let (stdout, stdin) = tokio::io::split(gateway_side);

    let fanout = Fanout::new();
    let controller = FakeChildController::new();
    let session = SubprocessSession::connect::<_, _, tokio::io::DuplexStream>(
        Box::pin(stdin),
        stdout,
        None,
        controller.clone(),
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

    while session.state().await != SessionState::Processing {
        tokio::task::yield_now().await;
    }

    controller.exit(ExitStatus { exit_code: 137, signal: None }).await;

    let err = prompt.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::ChildExited { code: Some(137), signal: None }));

    let exit_event = loop {
        match events.recv().await.unwrap() {
            SessionEvent::Exit { code, signal, .. } => break (code, signal),
            _ => continue,
        }
    };
    assert_eq!(exit_event, (Some(137), None));

    assert_eq!(session.state().await, SessionState::Terminated);
}
