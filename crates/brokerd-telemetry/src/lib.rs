//! Logging setup and session-scoped tracing context for the brokerd
//! agent gateway.
//!
//! # Example
//!
//! ```rust,no_run
//! use brokerd_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), brokerd_telemetry::TelemetryError> {
//! let config = LogConfig::new("info").with_format(LogFormat::Json);
//! setup_logging(&config)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod context;
mod error;
mod logging;
pub mod prelude;

pub use context::SessionContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
