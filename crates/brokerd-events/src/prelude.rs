//! Commonly used types for convenient import.
//!
//! ```rust
//! use brokerd_events::prelude::*;
//! ```

pub use crate::{DEFAULT_SUBSCRIBER_CAPACITY, Fanout, SessionEvent, SubscriptionToken};
