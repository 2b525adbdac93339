//! Errors from driving an in-process agent SDK query.

use thiserror::Error;

/// Errors the SDK session backend can surface.
#[derive(Debug, Error)]
pub enum SdkError {
    /// `sendPrompt` was called while a query was already in flight
    /// (spec §4.3: "At most one query may be active at a time").
    #[error("prompt already processing")]
    PromptAlreadyProcessing,

    /// An information-cache method (`supportedModels`, `accountInfo`,
    /// `mcpServerStatus`, `supportedCommands`) was called with no query
    /// ever started and no cached value available.
    #[error("no active query — send a prompt first")]
    NoActiveQuery,

    /// The SDK rejected the query construction itself (bad options,
    /// missing credentials, etc).
    #[error("failed to start query: {0}")]
    QueryStartFailed(String),

    /// The underlying message stream produced an error that was not a
    /// cancellation.
    #[error("SDK stream error: {0}")]
    StreamError(String),

    /// A live-query control method (`setModel`, `interrupt`, ...) was
    /// invoked against a handle that has already finished or errored.
    #[error("query handle is no longer live")]
    HandleNotLive,
}

/// Result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;
