//! In-memory storage backend.
//!
//! Stores everything in a `BTreeMap` behind a `RwLock`. Nothing survives a
//! restart. Used by the test suites and by `YONOTE_STORAGE=memory` for
//! throwaway instances.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Cloning is cheap and clones share the same map. Keys are kept sorted, so
/// prefix listing is a `BTreeMap::range` walk.
///
/// # Examples
///
/// ```
/// # use yonote_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("notes/abc", b"{}").await.unwrap();
/// let val = backend.get("notes/abc").await.unwrap();
/// assert_eq!(val, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the backend holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let map = self.data.read().await;
        Ok(map
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.read().await.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("notes/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let backend = MemoryBackend::new();
        backend.put("notes/a", b"v1").await.unwrap();
        backend.put("notes/a", b"v2").await.unwrap();
        assert_eq!(backend.get("notes/a").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn delete_nonexistent_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete("nope").await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn list_stops_at_prefix_boundary() {
        let backend = MemoryBackend::new();
        backend.put("lockouts/abc/1.1.1.1", b"1").await.unwrap();
        backend.put("lockouts/abc/2.2.2.2", b"2").await.unwrap();
        backend.put("lockouts/abcd/1.1.1.1", b"3").await.unwrap();
        backend.put("notes/abc", b"4").await.unwrap();

        let keys = backend.list("lockouts/abc/").await.unwrap();
        assert_eq!(keys, vec!["lockouts/abc/1.1.1.1", "lockouts/abc/2.2.2.2"]);
    }

    #[tokio::test]
    async fn list_empty_prefix_returns_all() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").await.unwrap();
        backend.put("b", b"2").await.unwrap();
        assert_eq!(backend.list("").await.unwrap(), vec!["a", "b"]);
        assert_eq!(backend.len().await, 2);
    }

    #[tokio::test]
    async fn exists_tracks_put_and_delete() {
        let backend = MemoryBackend::new();
        assert!(!backend.exists("k").await.unwrap());
        backend.put("k", b"v").await.unwrap();
        assert!(backend.exists("k").await.unwrap());
        backend.delete("k").await.unwrap();
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("key", b"val").await.unwrap();
        assert_eq!(clone.get("key").await.unwrap(), Some(b"val".to_vec()));
    }
}
