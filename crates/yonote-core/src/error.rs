//! Error types for `yonote-core`.
//!
//! Each variant carries enough context to diagnose the problem from a log
//! line. Crypto errors never include key material or plaintext, only an
//! operation description.

use yonote_storage::StorageError;

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// AES-256-GCM decryption failed (wrong key, corrupted ciphertext, or tampered tag).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// The stored ciphertext is not valid base64.
    #[error("ciphertext is not valid base64: {reason}")]
    Encoding { reason: String },

    /// Ciphertext is too short to contain a valid nonce + tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },

    /// Decrypted bytes are not UTF-8 text.
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from the note store.
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    /// No note exists under the key.
    #[error("note not found: {key}")]
    NotFound { key: String },

    /// A note already exists under the key.
    #[error("note already exists: {key}")]
    AlreadyExists { key: String },

    /// The key is not a valid note key.
    #[error("invalid note key: {reason}")]
    InvalidKey { reason: String },

    /// No unused key could be generated.
    #[error("could not generate an unused key after {attempts} attempts")]
    KeySpaceExhausted { attempts: u32 },

    /// A stored record could not be encoded or decoded.
    #[error("note serialization failed for '{key}': {reason}")]
    Serialization { key: String, reason: String },

    /// The password hashing task did not finish.
    #[error("password hashing failed: {reason}")]
    Hashing { reason: String },

    /// Sealing note content failed.
    #[error("note crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The underlying storage backend returned an error.
    #[error("note storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the lockout tracker.
#[derive(Debug, thiserror::Error)]
pub enum LockoutError {
    /// A stored lockout entry could not be encoded or decoded.
    #[error("lockout serialization failed: {reason}")]
    Serialization { reason: String },

    /// The underlying storage backend returned an error.
    #[error("lockout storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from decoding a session auth token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The token does not have the `v1.<payload>.<signature>` shape.
    #[error("malformed session token")]
    Malformed,

    /// The token carries an unknown version tag.
    #[error("unsupported session token version '{version}'")]
    UnsupportedVersion { version: String },

    /// The signature does not match the payload.
    #[error("session token signature mismatch")]
    BadSignature,

    /// The payload is not the expected JSON document.
    #[error("session payload invalid: {reason}")]
    Payload { reason: String },

    /// The signing secret cannot key the MAC.
    #[error("invalid session secret: {reason}")]
    InvalidSecret { reason: String },
}

/// Errors from admin authentication and sessions.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// No admin password hash is configured.
    #[error("admin access is not configured")]
    NotConfigured,

    /// The supplied admin password is wrong.
    #[error("invalid admin password")]
    InvalidPassword,

    /// The session token is unknown.
    #[error("admin session not found")]
    SessionNotFound,

    /// The session token has expired.
    #[error("admin session expired at {expired_at}")]
    Expired { expired_at: i64 },

    /// A stored session could not be encoded or decoded.
    #[error("admin session serialization failed: {reason}")]
    Serialization { reason: String },

    /// The underlying storage backend returned an error.
    #[error("admin storage error: {0}")]
    Storage(#[from] StorageError),
}
