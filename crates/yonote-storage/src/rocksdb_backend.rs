//! `RocksDB` storage backend.
//!
//! Every record lives in the default column family. Prefix scans are bounded
//! with an upper key so a `lockouts/<key>/` listing never walks into the
//! next note's entries. Calls run on the blocking pool since `RocksDB` is
//! synchronous.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{
    DBCompressionType, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options,
    ReadOptions,
};
use tracing::debug;

use crate::{StorageBackend, StorageError};

type Db = DBWithThreadMode<MultiThreaded>;

/// Block cache for point lookups, in MiB.
const POINT_LOOKUP_CACHE_MB: u64 = 64;

/// A storage backend backed by a `RocksDB` directory.
///
/// # Examples
///
/// ```no_run
/// # use yonote_storage::RocksDbBackend;
/// let backend = RocksDbBackend::open("./data/rocksdb").unwrap();
/// ```
#[derive(Clone)]
pub struct RocksDbBackend {
    db: Arc<Db>,
    path: PathBuf,
}

impl std::fmt::Debug for RocksDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// when no such bound exists (empty or all-`0xff` prefix).
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last.saturating_add(1));
            return Some(bound);
        }
    }
    None
}

impl RocksDbBackend {
    /// Open a `RocksDB` database at the given path, creating it if missing.
    ///
    /// Compression is off: note bodies arrive sealed and do not shrink.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` fails to open or create the
    /// database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(DBCompressionType::None);
        opts.optimize_for_point_lookup(POINT_LOOKUP_CACHE_MB);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "rocksdb storage opened");

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` on the blocking pool. A panicked task maps through `on_panic`.
    async fn blocking<T, F>(
        &self,
        op: F,
        on_panic: impl FnOnce(String) -> StorageError,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| on_panic(format!("blocking task panicked: {e}")))?
    }
}

#[async_trait::async_trait]
impl StorageBackend for RocksDbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let owned = key.to_owned();
        self.blocking(
            move |db| {
                db.get(owned.as_bytes()).map_err(|e| StorageError::Read {
                    key: owned.clone(),
                    reason: e.to_string(),
                })
            },
            |reason| StorageError::Read {
                key: key.to_owned(),
                reason,
            },
        )
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let value = value.to_vec();
        self.blocking(
            move |db| {
                db.put(owned.as_bytes(), &value)
                    .map_err(|e| StorageError::Write {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Write {
                key: key.to_owned(),
                reason,
            },
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let owned = key.to_owned();
        self.blocking(
            move |db| {
                db.delete(owned.as_bytes())
                    .map_err(|e| StorageError::Delete {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Delete {
                key: key.to_owned(),
                reason,
            },
        )
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let owned = prefix.to_owned();
        self.blocking(
            move |db| {
                let mut read_opts = ReadOptions::default();
                if let Some(bound) = prefix_upper_bound(owned.as_bytes()) {
                    read_opts.set_iterate_upper_bound(bound);
                }
                let iter = db.iterator_opt(
                    IteratorMode::From(owned.as_bytes(), Direction::Forward),
                    read_opts,
                );

                let mut keys = Vec::new();
                for item in iter {
                    let (k, _) = item.map_err(|e| StorageError::List {
                        prefix: owned.clone(),
                        reason: e.to_string(),
                    })?;
                    let key = String::from_utf8(k.into_vec()).map_err(|e| {
                        StorageError::InvalidKey {
                            reason: e.to_string(),
                        }
                    })?;
                    if !key.starts_with(&owned) {
                        break;
                    }
                    keys.push(key);
                }
                Ok(keys)
            },
            |reason| StorageError::List {
                prefix: prefix.to_owned(),
                reason,
            },
        )
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let owned = key.to_owned();
        self.blocking(
            move |db| {
                // Bloom-filter miss answers without touching disk.
                if !db.key_may_exist(owned.as_bytes()) {
                    return Ok(false);
                }
                db.get_pinned(owned.as_bytes())
                    .map(|v| v.is_some())
                    .map_err(|e| StorageError::Read {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Read {
                key: key.to_owned(),
                reason,
            },
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_skips_past_prefix() {
        assert_eq!(prefix_upper_bound(b"lockouts/abc/"), Some(b"lockouts/abc0".to_vec()));
        assert_eq!(prefix_upper_bound(b"a\xff"), Some(b"b".to_vec()));
        assert_eq!(prefix_upper_bound(b"\xff\xff"), None);
        assert_eq!(prefix_upper_bound(b""), None);
    }

    #[tokio::test]
    async fn prefix_listing_stays_inside_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksDbBackend::open(dir.path().join("db")).unwrap();
        backend.put("lockouts/abc/1.1.1.1", b"{}").await.unwrap();
        backend.put("lockouts/abcd/2.2.2.2", b"{}").await.unwrap();
        backend.put("notes/abc", b"{}").await.unwrap();

        let keys = backend.list("lockouts/abc/").await.unwrap();
        assert_eq!(keys, vec!["lockouts/abc/1.1.1.1".to_owned()]);
        assert!(backend.exists("notes/abc").await.unwrap());
        backend.delete("notes/abc").await.unwrap();
        assert!(!backend.exists("notes/abc").await.unwrap());
    }
}
