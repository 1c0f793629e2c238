//! Storage error types.
//!
//! Every variant names the key or prefix it failed on so a log line is
//! enough to diagnose the problem.

/// A failed backend call.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be opened or connected. `path` is a file
    /// path, or a placeholder for a database URL.
    #[error("cannot open storage '{path}': {reason}")]
    Open { path: String, reason: String },

    #[error("read of '{key}' failed: {reason}")]
    Read { key: String, reason: String },

    #[error("write of '{key}' failed: {reason}")]
    Write { key: String, reason: String },

    #[error("delete of '{key}' failed: {reason}")]
    Delete { key: String, reason: String },

    #[error("listing '{prefix}*' failed: {reason}")]
    List { prefix: String, reason: String },

    /// The redb data table is missing or has the wrong schema.
    #[error("storage table unavailable: {name}")]
    MissingTable { name: String },

    /// A redb transaction could not begin or commit.
    #[error("storage transaction failed: {reason}")]
    Transaction { reason: String },

    /// A stored key is not UTF-8, so it cannot name a note.
    #[error("stored key is not valid UTF-8: {reason}")]
    InvalidKey { reason: String },
}
