//! Shared application state for the `yonote` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. It owns the note store, the lockout tracker, the
//! session signer, and the admin session store. Nothing lives in globals.

use std::sync::Arc;

use yonote_core::admin::AdminSessionStore;
use yonote_core::crypto::ContentCipher;
use yonote_core::error::SessionError;
use yonote_core::lockout::LockoutTracker;
use yonote_core::note::NoteStore;
use yonote_core::session::SessionSigner;
use yonote_storage::StorageBackend;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Note records.
    pub notes: NoteStore,
    /// Failed password attempt counters and locks.
    pub lockouts: LockoutTracker,
    /// Signs the per-browser auth set cookie.
    pub signer: SessionSigner,
    /// Admin login and sessions.
    pub admin: AdminSessionStore,
    /// Set the `Secure` flag on cookies.
    pub cookie_secure: bool,
    /// Trust forwarding headers for the client address.
    pub trust_proxy: bool,
    /// Reported by `/api/health`.
    pub environment: String,
}

impl AppState {
    /// Build the state from a storage backend, the content cipher, and config.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the session secret cannot key the signer.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        cipher: ContentCipher,
        config: &ServerConfig,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            notes: NoteStore::new(Arc::clone(&storage), cipher),
            lockouts: LockoutTracker::new(Arc::clone(&storage)),
            signer: SessionSigner::new(config.session_secret.as_bytes())?,
            admin: AdminSessionStore::new(storage, config.admin_password_hash.clone()),
            cookie_secure: config.cookie_secure,
            trust_proxy: config.trust_proxy,
            environment: config.environment.clone(),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
