//! Errors from managed-terminal and filesystem requests (spec §4.4,
//! §4.1's `fs/*` handlers).

/// Errors the `terminal/*` and `fs/*` request handlers can return.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    /// No terminal exists with the given id (never created, or already
    /// released).
    #[error("Terminal not found: {id}")]
    NotFound {
        /// The referenced terminal id.
        id: String,
    },

    /// Spawning the managed child failed.
    #[error("failed to spawn terminal process: {0}")]
    SpawnFailed(String),

    /// A filesystem read/write failed.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// `fs/read_text_file` found content that was not valid UTF-8.
    #[error("file is not valid UTF-8: {path}")]
    NotUtf8 {
        /// The offending path.
        path: String,
    },
}

/// Result type for terminal and filesystem operations.
pub type TerminalResult<T> = Result<T, TerminalError>;
