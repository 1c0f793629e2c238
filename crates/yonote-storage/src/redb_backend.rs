//! Pure-Rust redb storage backend, used by the CLI by default.
//!
//! A single B-tree table holds every record; namespacing (`notes/`,
//! `lockouts/`, `sys/`) happens in the key. Every `put` and `delete` runs in
//! its own write transaction, which is what gives each call its atomicity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{StorageBackend, StorageError};

const DATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("yonote");

/// A storage backend backed by a single redb file.
///
/// Blocking redb calls are offloaded to the Tokio blocking thread pool.
///
/// # Examples
///
/// ```no_run
/// # use yonote_storage::RedbBackend;
/// let backend = RedbBackend::open("./data/notes.redb").unwrap();
/// ```
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// Parent directories are created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the file cannot be created or opened,
    /// or [`StorageError::Transaction`] if the table cannot be initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let db = Database::create(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Opening the table inside a write txn creates it if missing.
        let txn = db.begin_write().map_err(transaction_err)?;
        {
            let _table = txn.open_table(DATA_TABLE).map_err(missing_table)?;
        }
        txn.commit().map_err(transaction_err)?;

        debug!(path = %path.display(), "redb storage opened");

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn transaction_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

fn missing_table(e: impl std::fmt::Display) -> StorageError {
    StorageError::MissingTable {
        name: format!("yonote: {e}"),
    }
}

type Table<'txn> = redb::Table<'txn, &'static str, &'static [u8]>;
type ReadOnlyTable = redb::ReadOnlyTable<&'static str, &'static [u8]>;

impl RedbBackend {
    /// Run `op` against the data table inside a read transaction on the
    /// blocking pool.
    async fn read<T, F>(&self, op: F, on_panic: StorageError) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&ReadOnlyTable) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(transaction_err)?;
            let table = txn.open_table(DATA_TABLE).map_err(missing_table)?;
            op(&table)
        })
        .await
        .map_err(|_| on_panic)?
    }

    /// Run `op` against the data table inside its own write transaction and
    /// commit it.
    async fn write<F>(&self, op: F, on_panic: StorageError) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Table<'_>) -> Result<(), StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write().map_err(transaction_err)?;
            {
                let mut table = txn.open_table(DATA_TABLE).map_err(missing_table)?;
                op(&mut table)?;
            }
            txn.commit().map_err(transaction_err)
        })
        .await
        .map_err(|_| on_panic)?
    }
}

fn panicked(key: &str) -> (String, String) {
    (key.to_owned(), "blocking task panicked".to_owned())
}

#[async_trait::async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let owned = key.to_owned();
        let (key, reason) = panicked(key);
        self.read(
            move |table| {
                let value = table.get(owned.as_str()).map_err(|e| StorageError::Read {
                    key: owned.clone(),
                    reason: e.to_string(),
                })?;
                Ok(value.map(|v| v.value().to_vec()))
            },
            StorageError::Read { key, reason },
        )
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let value = value.to_vec();
        let (key, reason) = panicked(key);
        self.write(
            move |table| {
                table
                    .insert(owned.as_str(), value.as_slice())
                    .map_err(|e| StorageError::Write {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            },
            StorageError::Write { key, reason },
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let (key, reason) = panicked(key);
        self.write(
            move |table| {
                // Ok(None) when the key is absent.
                table
                    .remove(owned.as_str())
                    .map_err(|e| StorageError::Delete {
                        key: owned.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            },
            StorageError::Delete { key, reason },
        )
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let owned = prefix.to_owned();
        let (prefix, reason) = panicked(prefix);
        self.read(
            move |table| {
                let list_err = |e: redb::StorageError| StorageError::List {
                    prefix: owned.clone(),
                    reason: e.to_string(),
                };
                let mut keys = Vec::new();
                for item in table.range(owned.as_str()..).map_err(list_err)? {
                    let (k, _) = item.map_err(list_err)?;
                    let key = k.value();
                    if !key.starts_with(owned.as_str()) {
                        break;
                    }
                    keys.push(key.to_owned());
                }
                Ok(keys)
            },
            StorageError::List { prefix, reason },
        )
        .await
    }
}
