//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested key or record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The embedded store reported a failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record could not be (de)serialised.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The schema version on disk is newer than this build supports.
    #[error("schema version {found} is newer than supported version {supported}")]
    SchemaTooNew {
        /// The version found on disk.
        found: u32,
        /// The highest version this build supports.
        supported: u32,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
