//! Raw key-value tier.
//!
//! Everything above this module (session, transcript, and event records)
//! is serialised JSON stored under namespaced keys. A single [`KvStore`]
//! trait lets the persistence adapter run against either the embedded
//! `SurrealKV` engine in production or an in-memory map in tests,
//! matching the "single-writer serialisation discipline" spec §5 asks of
//! the persistence store.

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() || namespace.contains('\0') {
        return Err(StorageError::Serialization(format!("invalid namespace {namespace:?}")));
    }
    Ok(())
}

#[cfg(feature = "kv")]
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len() + 1 + key.len());
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

#[cfg(feature = "kv")]
fn namespace_range_start(namespace: &str) -> Vec<u8> {
    let mut buf = namespace.as_bytes().to_vec();
    buf.push(0);
    buf
}

#[cfg(feature = "kv")]
fn namespace_range_end(namespace: &str) -> Vec<u8> {
    let mut buf = namespace.as_bytes().to_vec();
    buf.push(1);
    buf
}

/// A namespaced byte-level key-value store.
///
/// `sessions`, `messages`, `session_events`, and `workspaces` (spec §6)
/// are each their own namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value at `(namespace, key)`, if present.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write `value` at `(namespace, key)`, overwriting any existing value.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove the value at `(namespace, key)`. Returns whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List every key in `namespace`.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

/// An in-memory [`KvStore`], for tests and single-process dev use.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: std::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}\0{key}")
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        let data = self.data.read().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data.get(&Self::full_key(namespace, key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        let mut data = self.data.write().map_err(|e| StorageError::Backend(e.to_string()))?;
        data.insert(Self::full_key(namespace, key), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        let mut data = self.data.write().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data.remove(&Self::full_key(namespace, key)).is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let data = self.data.read().map_err(|e| StorageError::Backend(e.to_string()))?;
        let prefix = format!("{namespace}\0");
        Ok(data.keys().filter_map(|k| k.strip_prefix(&prefix)).map(str::to_string).collect())
    }
}

/// A [`KvStore`] backed by the embedded `SurrealKV` engine.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (creating if absent) a `SurrealKV` store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { tree })
    }
}

#[cfg(feature = "kv")]
fn map_kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        let ck = composite_key(namespace, key);
        let tx = self.tree.begin_with_mode(surrealkv::Mode::ReadOnly).map_err(|ref e| map_kv_err(e))?;
        tx.get(&ck).map_err(|ref e| map_kv_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        tx.set(&ck, &value).map_err(|ref e| map_kv_err(e))?;
        tx.commit().await.map_err(|ref e| map_kv_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| map_kv_err(e))?;
            tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let start = namespace_range_start(namespace);
        let end = namespace_range_end(namespace);
        let prefix_len = namespace.len() + 1;

        let tx = self.tree.begin_with_mode(surrealkv::Mode::ReadOnly).map_err(|ref e| map_kv_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| map_kv_err(e))?;
        iter.seek_first().map_err(|ref e| map_kv_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw_key = iter.key();
            if raw_key.len() > prefix_len {
                if let Ok(key_str) = std::str::from_utf8(&raw_key[prefix_len..]) {
                    keys.push(key_str.to_string());
                }
            }
            iter.next().map_err(|ref e| map_kv_err(e))?;
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryKvStore::new();
        store.set("sessions", "a", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("sessions", "a").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn deleted_keys_read_back_as_none() {
        let store = MemoryKvStore::new();
        store.set("sessions", "a", b"hello".to_vec()).await.unwrap();
        assert!(store.delete("sessions", "a").await.unwrap());
        assert_eq!(store.get("sessions", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_is_scoped_to_its_namespace() {
        let store = MemoryKvStore::new();
        store.set("sessions", "a", vec![]).await.unwrap();
        store.set("sessions", "b", vec![]).await.unwrap();
        store.set("workspaces", "a", vec![]).await.unwrap();

        let mut keys = store.list_keys("sessions").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
