//! Admin authentication.
//!
//! The admin password is configured as a `pbkdf2$...` hash. A correct login
//! mints a session token: a UUID v4 handed to the browser once. Only its
//! SHA-256 hash is stored, under `sys/admin-sessions/<hash>`, so a leaked
//! store cannot be replayed as a cookie.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use yonote_storage::StorageBackend;

use crate::error::AdminError;
use crate::password;
use crate::time;

/// Storage prefix for admin sessions.
const SESSION_PREFIX: &str = "sys/admin-sessions/";

/// Admin session lifetime.
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// A stored admin session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    /// Hex SHA-256 of the token; also the storage key suffix.
    pub token_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Hex SHA-256 of a plaintext session token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks the admin password and manages admin sessions.
pub struct AdminSessionStore {
    storage: Arc<dyn StorageBackend>,
    password_hash: Option<String>,
}

impl std::fmt::Debug for AdminSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSessionStore")
            .field("configured", &self.password_hash.is_some())
            .finish_non_exhaustive()
    }
}

impl AdminSessionStore {
    /// `password_hash` is `None` when admin access is disabled.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, password_hash: Option<String>) -> Self {
        Self {
            storage,
            password_hash: password_hash.filter(|h| !h.is_empty()),
        }
    }

    /// Whether an admin password is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Check the password and open a session.
    ///
    /// Returns the plaintext token. It is never stored.
    ///
    /// # Errors
    ///
    /// - [`AdminError::NotConfigured`] if admin access is disabled.
    /// - [`AdminError::InvalidPassword`] on a wrong password.
    /// - [`AdminError::Storage`] if the session cannot be written.
    pub async fn login(&self, candidate: &str) -> Result<String, AdminError> {
        self.login_at(candidate, time::now()).await
    }

    /// [`login`](Self::login) against an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn login_at(&self, candidate: &str, now: i64) -> Result<String, AdminError> {
        let hash = self.password_hash.as_deref().ok_or(AdminError::NotConfigured)?;
        if !password::spawn_verify_password(candidate, hash).await {
            warn!("admin login rejected");
            return Err(AdminError::InvalidPassword);
        }

        let token = uuid::Uuid::new_v4().to_string();
        let session = AdminSession {
            token_hash: hash_token(&token),
            created_at: now,
            expires_at: now.saturating_add(SESSION_TTL_SECS),
        };
        let bytes = serde_json::to_vec(&session).map_err(|e| AdminError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage
            .put(&format!("{SESSION_PREFIX}{}", session.token_hash), &bytes)
            .await?;

        info!(expires_at = session.expires_at, "admin session created");
        Ok(token)
    }

    /// Resolve a plaintext token to its live session.
    ///
    /// # Errors
    ///
    /// - [`AdminError::SessionNotFound`] for an unknown token.
    /// - [`AdminError::Expired`] for an expired one; it is deleted.
    pub async fn lookup(&self, token: &str) -> Result<AdminSession, AdminError> {
        self.lookup_at(token, time::now()).await
    }

    /// [`lookup`](Self::lookup) against an explicit clock.
    ///
    /// # Errors
    ///
    /// Same as [`lookup`](Self::lookup).
    pub async fn lookup_at(&self, token: &str, now: i64) -> Result<AdminSession, AdminError> {
        let key = format!("{SESSION_PREFIX}{}", hash_token(token));
        let bytes = self
            .storage
            .get(&key)
            .await?
            .ok_or(AdminError::SessionNotFound)?;
        let session: AdminSession =
            serde_json::from_slice(&bytes).map_err(|e| AdminError::Serialization {
                reason: e.to_string(),
            })?;

        if session.expires_at <= now {
            self.storage.delete(&key).await?;
            return Err(AdminError::Expired {
                expired_at: session.expires_at,
            });
        }
        Ok(session)
    }

    /// End a session. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Storage`] if the delete fails.
    pub async fn logout(&self, token: &str) -> Result<(), AdminError> {
        self.storage
            .delete(&format!("{SESSION_PREFIX}{}", hash_token(token)))
            .await?;
        info!("admin session ended");
        Ok(())
    }

    /// Delete expired sessions. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::Storage`] on storage failure.
    pub async fn purge_expired(&self, now: i64) -> Result<usize, AdminError> {
        let mut purged = 0usize;
        for key in self.storage.list(SESSION_PREFIX).await? {
            let Some(bytes) = self.storage.get(&key).await? else {
                continue;
            };
            let expired = serde_json::from_slice::<AdminSession>(&bytes)
                .map_or(true, |s| s.expires_at <= now);
            if expired {
                self.storage.delete(&key).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}
