//! Re-exports for convenient glob-importing.

pub use crate::{LogConfig, LogFormat, LogTarget, SessionContext, TelemetryError, TelemetryResult, setup_default_logging, setup_logging};
