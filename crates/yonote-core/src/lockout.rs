//! Per-(note, client address) password attempt tracking.
//!
//! Failed password checks are counted in a persisted entry under
//! `lockouts/<note key>/<client address>`, so counts survive restarts and are
//! shared by every instance on the same store. The fifth consecutive failure
//! locks the pair for 30 minutes and resets the counter. A successful check
//! deletes the entry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yonote_storage::StorageBackend;

use crate::error::LockoutError;
use crate::time;

/// Storage prefix for lockout entries.
const LOCKOUT_PREFIX: &str = "lockouts/";

/// Failures allowed before the pair is locked.
pub const MAX_ATTEMPTS: u32 = 5;

/// Lock length in seconds.
pub const LOCKOUT_SECS: i64 = 30 * 60;

/// Storage prefix holding every lockout entry for one note.
pub(crate) fn note_prefix(note_key: &str) -> String {
    format!("{LOCKOUT_PREFIX}{note_key}/")
}

fn entry_key(note_key: &str, address: &str) -> String {
    // Addresses come from headers when behind a proxy; keep them one segment.
    // `%` goes first so the escaping stays one-to-one.
    let address = address.replace('%', "%25").replace('/', "%2F");
    format!("{LOCKOUT_PREFIX}{note_key}/{address}")
}

/// A persisted attempt counter and optional active lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutEntry {
    pub note_key: String,
    pub client_address: String,
    /// Consecutive failures since the last lock or success.
    pub attempts: u32,
    /// Unix seconds; the pair is locked while this is in the future.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<i64>,
    pub created_at: i64,
}

/// Result of [`LockoutTracker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining_secs: i64,
}

impl LockStatus {
    const OPEN: Self = Self {
        locked: false,
        remaining_secs: 0,
    };
}

/// Result of [`LockoutTracker::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailureOutcome {
    /// This failure triggered a lock.
    pub locked: bool,
    /// Failures left before the lock, `0` once locked.
    pub attempts_remaining: u32,
    /// Lock length when `locked`, else `0`.
    pub remaining_secs: i64,
}

/// Tracks failed password checks on a storage backend.
pub struct LockoutTracker {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for LockoutTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockoutTracker").finish_non_exhaustive()
    }
}

impl LockoutTracker {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Whether the pair is currently locked.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError`] if the entry cannot be read or cleared.
    pub async fn check(&self, note_key: &str, address: &str) -> Result<LockStatus, LockoutError> {
        self.check_at(note_key, address, time::now()).await
    }

    /// [`check`](Self::check) against an explicit clock.
    ///
    /// An expired lock is deleted, which also resets the counter.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError`] if the entry cannot be read or cleared.
    pub async fn check_at(
        &self,
        note_key: &str,
        address: &str,
        now: i64,
    ) -> Result<LockStatus, LockoutError> {
        let Some(entry) = self.load(note_key, address).await? else {
            return Ok(LockStatus::OPEN);
        };
        let Some(until) = entry.locked_until else {
            return Ok(LockStatus::OPEN);
        };

        if until > now {
            return Ok(LockStatus {
                locked: true,
                remaining_secs: until.saturating_sub(now),
            });
        }

        self.storage.delete(&entry_key(note_key, address)).await?;
        debug!(note = %note_key, client = %address, "expired lockout cleared");
        Ok(LockStatus::OPEN)
    }

    /// Count a failed password check.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError`] if the entry cannot be read or written.
    pub async fn record_failure(
        &self,
        note_key: &str,
        address: &str,
    ) -> Result<FailureOutcome, LockoutError> {
        self.record_failure_at(note_key, address, time::now()).await
    }

    /// [`record_failure`](Self::record_failure) against an explicit clock.
    ///
    /// While a lock is active the entry is left untouched and the outcome
    /// reports the time left. An expired lock starts a new count.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError`] if the entry cannot be read or written.
    pub async fn record_failure_at(
        &self,
        note_key: &str,
        address: &str,
        now: i64,
    ) -> Result<FailureOutcome, LockoutError> {
        let fresh = || LockoutEntry {
            note_key: note_key.to_owned(),
            client_address: address.to_owned(),
            attempts: 0,
            locked_until: None,
            created_at: now,
        };
        let mut entry = match self.load(note_key, address).await? {
            // A failure that raced past `check` must not lift an active lock.
            Some(LockoutEntry {
                locked_until: Some(until),
                ..
            }) if until > now => {
                return Ok(FailureOutcome {
                    locked: true,
                    attempts_remaining: 0,
                    remaining_secs: until.saturating_sub(now),
                });
            }
            Some(entry) if entry.locked_until.is_some() => fresh(),
            Some(entry) => entry,
            None => fresh(),
        };

        entry.attempts = entry.attempts.saturating_add(1);

        let outcome = if entry.attempts >= MAX_ATTEMPTS {
            entry.attempts = 0;
            entry.locked_until = Some(now.saturating_add(LOCKOUT_SECS));
            warn!(
                note = %note_key,
                client = %address,
                lock_secs = LOCKOUT_SECS,
                "too many failed password attempts, locking"
            );
            FailureOutcome {
                locked: true,
                attempts_remaining: 0,
                remaining_secs: LOCKOUT_SECS,
            }
        } else {
            debug!(note = %note_key, client = %address, attempts = entry.attempts, "failed password attempt");
            FailureOutcome {
                locked: false,
                attempts_remaining: MAX_ATTEMPTS.saturating_sub(entry.attempts),
                remaining_secs: 0,
            }
        };

        self.save(&entry).await?;
        Ok(outcome)
    }

    /// Clear the counter and any lock after a correct password.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError::Storage`] if the delete fails.
    pub async fn record_success(&self, note_key: &str, address: &str) -> Result<(), LockoutError> {
        self.storage.delete(&entry_key(note_key, address)).await?;
        Ok(())
    }

    /// Delete entries that no longer hold anything back: expired locks, and
    /// unlocked counters older than one lock window.
    ///
    /// Returns how many entries were removed.
    ///
    /// # Errors
    ///
    /// Returns [`LockoutError`] on storage failure.
    pub async fn purge_expired(&self, now: i64) -> Result<usize, LockoutError> {
        let mut purged = 0usize;
        for key in self.storage.list(LOCKOUT_PREFIX).await? {
            let Some(bytes) = self.storage.get(&key).await? else {
                continue;
            };
            let stale = match serde_json::from_slice::<LockoutEntry>(&bytes) {
                Ok(entry) => match entry.locked_until {
                    Some(until) => until <= now,
                    None => entry.created_at.saturating_add(LOCKOUT_SECS) <= now,
                },
                Err(e) => {
                    warn!(key = %key, error = %e, "dropping unreadable lockout entry");
                    true
                }
            };
            if stale {
                self.storage.delete(&key).await?;
                purged += 1;
            }
        }
        if purged > 0 {
            info!(purged, "stale lockout entries removed");
        }
        Ok(purged)
    }

    async fn load(
        &self,
        note_key: &str,
        address: &str,
    ) -> Result<Option<LockoutEntry>, LockoutError> {
        let Some(bytes) = self.storage.get(&entry_key(note_key, address)).await? else {
            return Ok(None);
        };
        let entry = serde_json::from_slice(&bytes).map_err(|e| LockoutError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(Some(entry))
    }

    async fn save(&self, entry: &LockoutEntry) -> Result<(), LockoutError> {
        let bytes = serde_json::to_vec(entry).map_err(|e| LockoutError::Serialization {
            reason: e.to_string(),
        })?;
        self.storage
            .put(&entry_key(&entry.note_key, &entry.client_address), &bytes)
            .await?;
        Ok(())
    }
}
