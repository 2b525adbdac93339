//! Persistence adapter for the brokerd agent gateway.
//!
//! Two tiers:
//!
//! - [`kv`]: a raw namespaced byte-level [`kv::KvStore`], backed by the
//!   embedded `SurrealKV` engine in production (the `kv` feature,
//!   enabled by default) or an in-memory map in tests.
//! - [`adapter`]: the narrow [`adapter::PersistenceAdapter`] sessions
//!   call into, plus the durable `brokerd_audit::EventLog`
//!   implementation built on the same store.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod adapter;
pub mod error;
pub mod kv;
pub mod prelude;
pub mod records;

pub use adapter::{KvPersistenceAdapter, PersistenceAdapter};
pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};
pub use records::{BackendKind, SessionRecord, SessionState, WorkspaceRecord, SCHEMA_VERSION};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
