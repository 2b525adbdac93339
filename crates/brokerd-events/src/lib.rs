//! Per-session subscriber fan-out for the brokerd agent gateway.
//!
//! A [`Fanout`] is the broadcaster behind spec §4.6 and the design note in
//! §9: one input queue drained by a single task, feeding N subscriber
//! channels (WebSocket connections, SSE streams) with a backpressure
//! policy that never drops permission requests, tool-call updates,
//! completion events, or errors.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod bus;
mod event;
pub mod prelude;

pub use bus::{DEFAULT_SUBSCRIBER_CAPACITY, Fanout, SubscriptionToken};
pub use event::SessionEvent;
