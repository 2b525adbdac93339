//! Re-exports for convenient glob-importing.

pub use crate::{
    BackendKind, KvPersistenceAdapter, KvStore, MemoryKvStore, PersistenceAdapter, SessionRecord, SessionState,
    StorageError, StorageResult, WorkspaceRecord, SCHEMA_VERSION,
};

#[cfg(feature = "kv")]
pub use crate::SurrealKvStore;
