//! Per-session subscriber fan-out (spec §4.6, design note in §9).
//!
//! One input queue drained by a single task, fanning out to N subscriber
//! channels. This is deliberately not `tokio::sync::broadcast`: that
//! primitive lags (and drops) the *oldest* receiver uniformly, with no way
//! to protect critical events per spec §4.6 ("preserving: the first event
//! of each permission request, every tool-call start/update, the session
//! completion event, and every error"). Each subscriber gets its own
//! bounded queue and its own coalescing/drop policy instead.

use crate::event::SessionEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Default per-subscriber queue depth before backpressure kicks in.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Opaque handle identifying one subscriber, removable on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Fan-out hub for one session's events.
///
/// Cloning is cheap (an `Arc` internally); every clone publishes into the
/// same fan-out. The draining task lives for as long as at least one
/// `Fanout` (or its internal sender) is alive.
#[derive(Clone)]
pub struct Fanout {
    inner: Arc<FanoutInner>,
}

struct FanoutInner {
    tx: mpsc::UnboundedSender<SessionEvent>,
    subscribers: tokio::sync::Mutex<Vec<Subscriber>>,
    next_token: AtomicU64,
}

struct Subscriber {
    token: SubscriptionToken,
    tx: mpsc::Sender<SessionEvent>,
    /// The most recent coalescible event dropped for lack of queue room,
    /// held back to flush once a slot opens up instead of being lost.
    coalesced: Option<SessionEvent>,
}

impl Fanout {
    /// Create a new fan-out hub and spawn its draining task.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(FanoutInner {
            tx,
            subscribers: tokio::sync::Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        });
        Self::spawn_drain(Arc::clone(&inner), rx);
        Self { inner }
    }

    fn spawn_drain(inner: Arc<FanoutInner>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut subscribers = inner.subscribers.lock().await;
                for sub in subscribers.iter_mut() {
                    deliver(sub, event.clone()).await;
                }
            }
        });
    }

    /// Publish an event; delivered to every current subscriber in order.
    ///
    /// Returns an error only if the internal drain task has already shut
    /// down (meaning the `Fanout` is being torn down).
    pub fn publish(&self, event: SessionEvent) {
        if self.inner.tx.send(event).is_err() {
            trace!("fan-out publish after drain task shutdown; dropping event");
        }
    }

    /// Register a new subscriber, returning its token and receive half.
    pub async fn subscribe(&self, capacity: usize) -> (SubscriptionToken, mpsc::Receiver<SessionEvent>) {
        let token = SubscriptionToken(self.inner.next_token.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel(capacity);
        self.inner.subscribers.lock().await.push(Subscriber { token, tx, coalesced: None });
        (token, rx)
    }

    /// Remove a subscriber (on disconnect).
    pub async fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.subscribers.lock().await.retain(|s| s.token != token);
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().await.len()
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}

/// Deliver one event to one subscriber, applying the backpressure policy
/// from spec §4.6: drop the oldest non-critical events to make room, never
/// drop a critical one, and coalesce runs of coalescible events (text
/// deltas) into whichever is most recent rather than dropping them outright.
async fn deliver(sub: &mut Subscriber, event: SessionEvent) {
    if let Some(pending) = sub.coalesced.take() {
        if let Err(mpsc::error::TrySendError::Full(pending)) = sub.tx.try_send(pending) {
            sub.coalesced = Some(pending);
        }
    }

    match sub.tx.try_send(event) {
        Ok(()) => {},
        Err(mpsc::error::TrySendError::Full(event)) => {
            if event.is_critical() {
                // Critical events must never be dropped: apply
                // backpressure by awaiting a slot even though the queue
                // was full a moment ago.
                if sub.tx.send(event).await.is_err() {
                    warn!(token = sub.token.0, "subscriber gone while delivering critical event");
                }
            } else if event.is_coalescible() {
                // Keep only the newest; the one it replaces is dropped.
                trace!(token = sub.token.0, "coalescing event under backpressure");
                sub.coalesced = Some(event);
            } else {
                trace!(token = sub.token.0, "dropping non-critical event under backpressure");
            }
        },
        Err(mpsc::error::TrySendError::Closed(_)) => {
            trace!(token = sub.token.0, "subscriber channel closed");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brokerd_core::SessionId;

    #[tokio::test]
    async fn subscriber_receives_events_in_publish_order() {
        let fanout = Fanout::new();
        let (_token, mut rx) = fanout.subscribe(DEFAULT_SUBSCRIBER_CAPACITY).await;
        let session_id = SessionId::new();

        fanout.publish(SessionEvent::Activity { session_id, at: chrono::Utc::now() });
        fanout.publish(SessionEvent::Idle { session_id });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::Activity { .. }));
        assert!(matches!(second, SessionEvent::Idle { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let fanout = Fanout::new();
        let (token, mut rx) = fanout.subscribe(DEFAULT_SUBSCRIBER_CAPACITY).await;
        fanout.unsubscribe(token).await;
        fanout.publish(SessionEvent::Idle { session_id: SessionId::new() });
        // Give the drain task a chance to run; no event should arrive.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn critical_events_survive_a_full_queue_of_noncritical_ones() {
        let fanout = Fanout::new();
        let (_token, mut rx) = fanout.subscribe(2).await;
        let session_id = SessionId::new();

        // Fill the subscriber's queue with coalescible text chunks plus
        // one critical error, without draining in between.
        for i in 0..5 {
            fanout.publish(SessionEvent::Message {
                session_id,
                payload: serde_json::json!({"text": format!("chunk-{i}")}),
            });
        }
        fanout.publish(SessionEvent::Error { session_id, message: "boom".into() });

        let mut saw_error = false;
        loop {
            let next = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
            match next {
                Ok(Some(event)) => {
                    if matches!(event, SessionEvent::Error { .. }) {
                        saw_error = true;
                        break;
                    }
                },
                _ => break,
            }
        }
        assert!(saw_error, "critical error event must not be dropped under backpressure");
    }

    #[tokio::test]
    async fn a_run_of_coalescible_events_collapses_to_the_newest_once_flushed() {
        let fanout = Fanout::new();
        let (_token, mut rx) = fanout.subscribe(1).await;
        let session_id = SessionId::new();

        // The first chunk fills the lone queue slot; the rest are
        // coalesced against each other without ever reaching the channel.
        for i in 0..4 {
            fanout.publish(SessionEvent::Message {
                session_id,
                payload: serde_json::json!({"text": format!("chunk-{i}")}),
            });
        }
        // Give the drain task a chance to process the backlog and settle
        // on the newest coalesced event.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let first = rx.recv().await.unwrap();
        match first {
            SessionEvent::Message { payload, .. } => assert_eq!(payload["text"], "chunk-0"),
            other => panic!("expected the first chunk to have reached the queue untouched, got {other:?}"),
        }

        // Publishing once more flushes the held-back coalesced event before
        // the new one, and it is the most recent chunk, not an earlier one.
        fanout.publish(SessionEvent::Idle { session_id });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let flushed = rx.recv().await.unwrap();
        match flushed {
            SessionEvent::Message { payload, .. } => assert_eq!(payload["text"], "chunk-3"),
            other => panic!("expected the coalesced chunk-3 message, got {other:?}"),
        }
    }
}
