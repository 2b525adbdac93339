//! Commonly used types for convenient import.
//!
//! ```rust
//! use brokerd_core::prelude::*;
//! ```

pub use crate::{BackendId, GatewayError, GatewayResult, RetryConfig, Secret, SessionId, Timestamp, ToolCallId, retry};
