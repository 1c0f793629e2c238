//! Key-value storage for `yonote`.
//!
//! [`StorageBackend`] moves opaque bytes under string keys and nothing more.
//! `yonote-core` decides the layout (`notes/<key>`, `lockouts/<key>/<ip>`,
//! `sys/...`) and seals note content before it reaches a backend.
//!
//! Backends, each behind its own cargo feature except the in-memory one:
//!
//! - [`MemoryBackend`]: a sorted map, gone on restart
//! - [`RedbBackend`]: single-file embedded store (`redb-backend`)
//! - [`RocksDbBackend`]: `RocksDB` directory (`rocksdb-backend`)
//! - [`PostgresBackend`]: one `yonote_kv` table (`postgres-backend`)

mod error;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;
#[cfg(feature = "redb-backend")]
mod redb_backend;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresBackend;
#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbBackend;

/// Byte storage shared by every note store.
///
/// Keys use `/` as a separator and sort bytewise, so a prefix listing of
/// `lockouts/abc/` returns exactly the lockout records of note `abc`.
///
/// Every call stands alone. Two writers on one key race and the later `put`
/// is what remains.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Fetch the bytes stored under `key`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// [`StorageError::Read`] when the backend call fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// [`StorageError::Write`] when the backend call fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`. A missing key succeeds.
    ///
    /// # Errors
    ///
    /// [`StorageError::Delete`] when the backend call fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys beginning with `prefix`, sorted ascending. An empty prefix
    /// lists everything.
    ///
    /// # Errors
    ///
    /// [`StorageError::List`] when the backend call fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Whether `key` holds a value. Falls back to a full [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// [`StorageError::Read`] when the backend call fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.get(key).await.map(|value| value.is_some())
    }
}
