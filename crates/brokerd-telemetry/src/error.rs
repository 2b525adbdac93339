//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A log directive string (e.g. a `RUST_LOG`-style filter) was
    /// invalid.
    #[error("invalid log directive: {0}")]
    InvalidDirective(String),

    /// The global tracing subscriber was already installed.
    #[error("tracing subscriber already initialised")]
    AlreadyInitialised,

    /// Opening the log file target failed.
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
