//! Note store.
//!
//! Notes are persisted as JSON under `notes/<key>`. Content is sealed with
//! the deployment [`ContentCipher`] before it is written; the record carries
//! `is_encrypted` so rows written before encryption was enabled can still be
//! read and later migrated with [`NoteStore::encrypt_plaintext_notes`].
//!
//! Every mutation is a full fetch/replace of the record. There is no
//! optimistic concurrency: concurrent writers race and the last write wins.
//!
//! Invariant: `is_public` is only ever `true` while `password_hash` is set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yonote_storage::StorageBackend;

use crate::crypto::ContentCipher;
use crate::error::NoteError;
use crate::keygen::{generate_key, validate_key};
use crate::lockout;
use crate::password::{self, DEFAULT_ITERATIONS};
use crate::time;

/// Storage prefix for note records.
const NOTE_PREFIX: &str = "notes/";

/// How many random keys to try before giving up on auto-generation.
const GENERATE_ATTEMPTS: u32 = 32;

/// Largest page size the admin listing will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// A persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique key, also the URL path segment.
    pub key: String,
    /// Stored content: base64 ciphertext when `is_encrypted`, else plaintext.
    #[serde(default)]
    pub content: String,
    /// `pbkdf2$...` hash, or a legacy hex SHA-256.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// Readable without the password (requires a password to be set).
    #[serde(default)]
    pub is_public: bool,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
    /// Whether `content` is sealed.
    #[serde(default)]
    pub is_encrypted: bool,
}

impl Note {
    /// Whether the note is password-protected.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether a visitor without session auth may read the note.
    #[must_use]
    pub fn is_readable_without_auth(&self) -> bool {
        !self.has_password() || self.is_public
    }
}

/// What to do with a note's password on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordAction {
    /// Leave the current password untouched.
    Keep,
    /// Drop the password. Also makes the note private.
    Remove,
    /// Replace the password. An empty string behaves like [`Remove`](Self::Remove).
    Change(String),
}

impl PasswordAction {
    /// Build an action from the edit form's `password_action` and
    /// `new_password` fields. Unknown actions fall back to `Keep`.
    #[must_use]
    pub fn from_form(action: &str, new_password: &str) -> Self {
        match action {
            "remove" => Self::Remove,
            "change" if new_password.is_empty() => Self::Remove,
            "change" => Self::Change(new_password.to_owned()),
            _ => Self::Keep,
        }
    }
}

/// A full edit of a note.
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub content: String,
    pub password: PasswordAction,
    pub is_public: bool,
}

/// Admin listing filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFilter {
    /// Every note.
    #[default]
    All,
    /// No password.
    Public,
    /// Password set, not public.
    Private,
    /// Password set and public.
    Protected,
}

impl NoteFilter {
    fn matches(self, note: &Note) -> bool {
        match self {
            Self::All => true,
            Self::Public => !note.has_password(),
            Self::Private => note.has_password() && !note.is_public,
            Self::Protected => note.has_password() && note.is_public,
        }
    }
}

/// Admin listing query.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filter: NoteFilter,
    /// Case-insensitive substring matched against key and content.
    pub search: Option<String>,
    /// 1-based.
    pub page: usize,
    pub limit: usize,
}

/// A note without its content, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    pub key: String,
    pub has_password: bool,
    pub is_public: bool,
    pub is_encrypted: bool,
    pub is_empty: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteSummary {
    fn of(note: &Note, is_empty: bool) -> Self {
        Self {
            key: note.key.clone(),
            has_password: note.has_password(),
            is_public: note.is_public,
            is_encrypted: note.is_encrypted,
            is_empty,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// A single note for the admin detail view, content opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteDetail {
    #[serde(flatten)]
    pub summary: NoteSummary,
    /// Plaintext, or the decryption placeholder.
    pub content: String,
}

/// One page of the admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct NotePage {
    pub notes: Vec<NoteSummary>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

/// Notes listed under [`NoteStats::recent`].
pub const RECENT_NOTES: usize = 10;

/// Counts for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteStats {
    pub total: usize,
    pub public: usize,
    pub private: usize,
    pub protected: usize,
    pub empty: usize,
    /// Most recently updated notes, newest first.
    pub recent: Vec<NoteSummary>,
}

/// Reads and writes notes on a storage backend.
pub struct NoteStore {
    storage: Arc<dyn StorageBackend>,
    cipher: ContentCipher,
    password_iterations: u32,
}

impl std::fmt::Debug for NoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteStore")
            .field("password_iterations", &self.password_iterations)
            .finish_non_exhaustive()
    }
}

fn note_key(key: &str) -> String {
    format!("{NOTE_PREFIX}{key}")
}

impl NoteStore {
    /// Create a store over `storage`, sealing content with `cipher`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, cipher: ContentCipher) -> Self {
        Self {
            storage,
            cipher,
            password_iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Override the PBKDF2 work factor used for new note passwords.
    #[must_use]
    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations.max(1);
        self
    }

    /// Create an empty-or-seeded note under `key`.
    ///
    /// # Errors
    ///
    /// - [`NoteError::InvalidKey`] if the key is malformed.
    /// - [`NoteError::AlreadyExists`] if a note already uses the key.
    /// - [`NoteError::Storage`] / [`NoteError::Crypto`] on backend failure.
    pub async fn create(&self, key: &str, content: &str) -> Result<Note, NoteError> {
        validate_key(key)?;
        if self.storage.exists(&note_key(key)).await? {
            return Err(NoteError::AlreadyExists {
                key: key.to_owned(),
            });
        }

        let now = time::now();
        let note = Note {
            key: key.to_owned(),
            content: self.cipher.seal(content)?,
            password_hash: None,
            is_public: false,
            created_at: now,
            updated_at: now,
            is_encrypted: true,
        };
        self.write(&note).await?;

        info!(note = %key, "note created");
        Ok(note)
    }

    /// Create an empty note under a freshly generated, unused key.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::KeySpaceExhausted`] if every candidate collided.
    pub async fn create_with_generated_key(&self) -> Result<Note, NoteError> {
        for _ in 0..GENERATE_ATTEMPTS {
            let key = generate_key();
            match self.create(&key, "").await {
                Ok(note) => return Ok(note),
                Err(NoteError::AlreadyExists { .. }) => {
                    debug!(note = %key, "generated key collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(NoteError::KeySpaceExhausted {
            attempts: GENERATE_ATTEMPTS,
        })
    }

    /// Fetch a note.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Storage`] or [`NoteError::Serialization`].
    pub async fn read(&self, key: &str) -> Result<Option<Note>, NoteError> {
        let Some(bytes) = self.storage.get(&note_key(key)).await? else {
            return Ok(None);
        };
        let note = serde_json::from_slice(&bytes).map_err(|e| NoteError::Serialization {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Some(note))
    }

    /// Fetch a note, creating an empty one if the key is unused.
    ///
    /// Returns the note and whether it was just created.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create) and [`read`](Self::read).
    pub async fn get_or_create(&self, key: &str) -> Result<(Note, bool), NoteError> {
        if let Some(note) = self.read(key).await? {
            return Ok((note, false));
        }
        match self.create(key, "").await {
            Ok(note) => Ok((note, true)),
            // Lost a race with another creator; theirs wins.
            Err(NoteError::AlreadyExists { .. }) => {
                let note = self.read(key).await?.ok_or_else(|| NoteError::NotFound {
                    key: key.to_owned(),
                })?;
                Ok((note, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Plaintext content of a note, or the decryption placeholder.
    #[must_use]
    pub fn content(&self, note: &Note) -> String {
        if note.is_encrypted {
            self.cipher.open_or_placeholder(&note.key, &note.content)
        } else {
            note.content.clone()
        }
    }

    /// Plaintext content of a note, surfacing decryption failures.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Crypto`] if the content cannot be opened.
    pub fn try_content(&self, note: &Note) -> Result<String, NoteError> {
        if note.is_encrypted {
            Ok(self.cipher.open(&note.content)?)
        } else {
            Ok(note.content.clone())
        }
    }

    /// Apply a full edit: content, password policy, and visibility.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::NotFound`] if the note does not exist.
    pub async fn update(&self, key: &str, update: NoteUpdate) -> Result<Note, NoteError> {
        let mut note = self.require(key).await?;

        match update.password {
            PasswordAction::Keep => {}
            PasswordAction::Remove => note.password_hash = None,
            PasswordAction::Change(ref new) if new.is_empty() => note.password_hash = None,
            PasswordAction::Change(ref new) => {
                let hash = password::spawn_hash_password(new, self.password_iterations)
                    .await
                    .map_err(|e| NoteError::Hashing {
                        reason: e.to_string(),
                    })?;
                note.password_hash = Some(hash);
            }
        }
        note.is_public = update.is_public && note.has_password();
        note.content = self.cipher.seal(&update.content)?;
        note.is_encrypted = true;
        note.updated_at = time::now();

        self.write(&note).await?;
        info!(
            note = %key,
            has_password = note.has_password(),
            is_public = note.is_public,
            "note updated"
        );
        Ok(note)
    }

    /// Replace only the content (auto-save).
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::NotFound`] if the note does not exist.
    pub async fn update_content(&self, key: &str, content: &str) -> Result<Note, NoteError> {
        let mut note = self.require(key).await?;
        note.content = self.cipher.seal(content)?;
        note.is_encrypted = true;
        note.updated_at = time::now();
        self.write(&note).await?;
        debug!(note = %key, "note auto-saved");
        Ok(note)
    }

    /// Delete a note and every lockout recorded against it.
    ///
    /// Returns whether a note existed. Deleting a missing note is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Storage`] if the backend fails.
    pub async fn delete(&self, key: &str) -> Result<bool, NoteError> {
        let existed = self.storage.exists(&note_key(key)).await?;
        self.storage.delete(&note_key(key)).await?;

        for lockout_key in self.storage.list(&lockout::note_prefix(key)).await? {
            self.storage.delete(&lockout_key).await?;
        }

        if existed {
            info!(note = %key, "note deleted");
        }
        Ok(existed)
    }

    /// Check a candidate password against the note.
    ///
    /// Notes without a password never verify. The PBKDF2 work runs on the
    /// blocking pool.
    pub async fn verify_password(&self, note: &Note, candidate: &str) -> bool {
        match note.password_hash.as_deref() {
            Some(hash) => password::spawn_verify_password(candidate, hash).await,
            None => false,
        }
    }

    /// Every note, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Storage`] or [`NoteError::Serialization`].
    pub async fn list(&self) -> Result<Vec<Note>, NoteError> {
        let keys = self.storage.list(NOTE_PREFIX).await?;
        let mut notes = Vec::with_capacity(keys.len());
        for storage_key in keys {
            let key = storage_key.strip_prefix(NOTE_PREFIX).unwrap_or(&storage_key);
            if let Some(note) = self.read(key).await? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    /// One page of notes matching `query`, most recently updated first.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub async fn list_page(&self, query: &ListQuery) -> Result<NotePage, NoteError> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(1);
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<(Note, bool)> = Vec::new();
        for note in self.list().await? {
            if !query.filter.matches(&note) {
                continue;
            }
            let content = self.content(&note);
            if let Some(ref needle) = needle {
                let hit = note.key.to_lowercase().contains(needle.as_str())
                    || content.to_lowercase().contains(needle.as_str());
                if !hit {
                    continue;
                }
            }
            let is_empty = content.trim().is_empty();
            matching.push((note, is_empty));
        }
        matching.sort_by(|(a, _), (b, _)| {
            b.updated_at.cmp(&a.updated_at).then_with(|| a.key.cmp(&b.key))
        });

        let total = matching.len();
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let notes = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(note, is_empty)| NoteSummary::of(&note, is_empty))
            .collect();

        Ok(NotePage {
            notes,
            total,
            page,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Counts by visibility class, plus blank notes.
    ///
    /// # Errors
    ///
    /// Same as [`list`](Self::list).
    pub async fn stats(&self) -> Result<NoteStats, NoteError> {
        let mut stats = NoteStats::default();
        let mut summaries = Vec::new();
        for note in self.list().await? {
            stats.total += 1;
            if NoteFilter::Public.matches(&note) {
                stats.public += 1;
            } else if NoteFilter::Private.matches(&note) {
                stats.private += 1;
            } else {
                stats.protected += 1;
            }
            let is_empty = self.content(&note).trim().is_empty();
            if is_empty {
                stats.empty += 1;
            }
            summaries.push(NoteSummary::of(&note, is_empty));
        }
        summaries.sort_by(|a, b| {
            b.updated_at.cmp(&a.updated_at).then_with(|| a.key.cmp(&b.key))
        });
        summaries.truncate(RECENT_NOTES);
        stats.recent = summaries;
        Ok(stats)
    }

    /// One note with its content opened, for the admin detail view.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub async fn detail(&self, key: &str) -> Result<Option<NoteDetail>, NoteError> {
        let Some(note) = self.read(key).await? else {
            return Ok(None);
        };
        let content = self.content(&note);
        Ok(Some(NoteDetail {
            summary: NoteSummary::of(&note, content.trim().is_empty()),
            content,
        }))
    }

    /// Seal every note still stored as plaintext. Returns how many changed.
    ///
    /// `updated_at` is left alone so the migration is invisible to users.
    ///
    /// # Errors
    ///
    /// Returns the first storage or crypto failure; notes before it stay migrated.
    pub async fn encrypt_plaintext_notes(&self) -> Result<usize, NoteError> {
        let mut migrated = 0usize;
        for mut note in self.list().await? {
            if note.is_encrypted {
                continue;
            }
            note.content = self.cipher.seal(&note.content)?;
            note.is_encrypted = true;
            self.write(&note).await?;
            migrated += 1;
            debug!(note = %note.key, "note content encrypted");
        }
        info!(migrated, "plaintext notes encrypted");
        Ok(migrated)
    }

    /// Write a record as-is. Used by imports and tests that need exact timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`NoteError::Serialization`] or [`NoteError::Storage`].
    pub async fn write(&self, note: &Note) -> Result<(), NoteError> {
        let bytes = serde_json::to_vec(note).map_err(|e| NoteError::Serialization {
            key: note.key.clone(),
            reason: e.to_string(),
        })?;
        self.storage.put(&note_key(&note.key), &bytes).await?;
        Ok(())
    }

    async fn require(&self, key: &str) -> Result<Note, NoteError> {
        self.read(key).await?.ok_or_else(|| NoteError::NotFound {
            key: key.to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::crypto::{DECRYPTION_PLACEHOLDER, EncryptionKey};
    use yonote_storage::MemoryBackend;

    fn store_with(storage: Arc<dyn StorageBackend>) -> NoteStore {
        NoteStore::new(storage, ContentCipher::new(EncryptionKey::generate()))
            .with_password_iterations(10)
    }

    fn store() -> NoteStore {
        store_with(Arc::new(MemoryBackend::new()))
    }

    fn edit(content: &str, password: PasswordAction, is_public: bool) -> NoteUpdate {
        NoteUpdate {
            content: content.to_owned(),
            password,
            is_public,
        }
    }

    #[tokio::test]
    async fn create_and_read() {
        let store = store();
        let note = store.create("hello", "").await.unwrap();
        assert_eq!(note.content, "");
        assert!(!note.has_password());
        assert!(!note.is_public);

        let read = store.read("hello").await.unwrap().unwrap();
        assert_eq!(read, note);
        assert!(store.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_conflicts_and_validates() {
        let store = store();
        store.create("abc", "").await.unwrap();
        assert!(matches!(
            store.create("abc", "").await,
            Err(NoteError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.create("a b", "").await,
            Err(NoteError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn get_or_create_reports_creation() {
        let store = store();
        let (_, created) = store.get_or_create("fresh").await.unwrap();
        assert!(created);
        let (_, created) = store.get_or_create("fresh").await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn generated_key_is_usable() {
        let store = store();
        let note = store.create_with_generated_key().await.unwrap();
        assert!((3..=7).contains(&note.key.len()));
        assert!(store.read(&note.key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn content_is_sealed_at_rest() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let store = store_with(Arc::clone(&storage));
        store.create("sec", "").await.unwrap();
        store.update_content("sec", "top secret").await.unwrap();

        let raw = storage.get("notes/sec").await.unwrap().unwrap();
        let raw = String::from_utf8(raw).unwrap();
        assert!(!raw.contains("top secret"));

        let note = store.read("sec").await.unwrap().unwrap();
        assert!(note.is_encrypted);
        assert_eq!(store.content(&note), "top secret");
    }

    #[tokio::test]
    async fn password_lifecycle_and_public_invariant() {
        let store = store();
        store.create("pwd", "").await.unwrap();

        // Public without a password is refused.
        let note = store
            .update("pwd", edit("x", PasswordAction::Keep, true))
            .await
            .unwrap();
        assert!(!note.is_public);

        let note = store
            .update("pwd", edit("x", PasswordAction::Change("abc".into()), true))
            .await
            .unwrap();
        assert!(note.has_password());
        assert!(note.is_public);
        assert!(store.verify_password(&note, "abc").await);
        assert!(!store.verify_password(&note, "xyz").await);

        let kept = store
            .update("pwd", edit("y", PasswordAction::Keep, true))
            .await
            .unwrap();
        assert_eq!(kept.password_hash, note.password_hash);

        let removed = store
            .update("pwd", edit("y", PasswordAction::Remove, true))
            .await
            .unwrap();
        assert!(!removed.has_password());
        assert!(!removed.is_public);

        let store_note = store
            .update("pwd", edit("y", PasswordAction::Change("abc".into()), true))
            .await
            .unwrap();
        assert!(store_note.is_public);
        let emptied = store
            .update("pwd", edit("y", PasswordAction::Change(String::new()), true))
            .await
            .unwrap();
        assert!(!emptied.has_password());
        assert!(!emptied.is_public);
    }

    #[test]
    fn password_action_from_form() {
        assert_eq!(PasswordAction::from_form("keep", "x"), PasswordAction::Keep);
        assert_eq!(PasswordAction::from_form("remove", ""), PasswordAction::Remove);
        assert_eq!(PasswordAction::from_form("change", ""), PasswordAction::Remove);
        assert_eq!(
            PasswordAction::from_form("change", "n"),
            PasswordAction::Change("n".into())
        );
        assert_eq!(PasswordAction::from_form("bogus", "n"), PasswordAction::Keep);
    }

    #[tokio::test]
    async fn update_missing_note_is_not_found() {
        let store = store();
        assert!(matches!(
            store.update_content("nope", "x").await,
            Err(NoteError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_note_and_lockouts() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let store = store_with(Arc::clone(&storage));
        store.create("gone", "").await.unwrap();
        storage.put("lockouts/gone/1.2.3.4", b"{}").await.unwrap();
        storage.put("lockouts/gonex/1.2.3.4", b"{}").await.unwrap();

        assert!(store.delete("gone").await.unwrap());
        assert!(store.read("gone").await.unwrap().is_none());
        assert!(storage.list("lockouts/gone/").await.unwrap().is_empty());
        assert_eq!(storage.list("lockouts/gonex/").await.unwrap().len(), 1);

        assert!(!store.delete("gone").await.unwrap());
    }

    #[tokio::test]
    async fn undecryptable_content_becomes_placeholder() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let writer = store_with(Arc::clone(&storage));
        writer.create("lost", "").await.unwrap();
        writer.update_content("lost", "data").await.unwrap();

        let reader = store_with(storage);
        let note = reader.read("lost").await.unwrap().unwrap();
        assert_eq!(reader.content(&note), DECRYPTION_PLACEHOLDER);
        assert!(matches!(reader.try_content(&note), Err(NoteError::Crypto(_))));
    }

    #[tokio::test]
    async fn plaintext_rows_migrate() {
        let store = store();
        let legacy = Note {
            key: "old".into(),
            content: "plain words".into(),
            password_hash: None,
            is_public: false,
            created_at: 1,
            updated_at: 2,
            is_encrypted: false,
        };
        store.write(&legacy).await.unwrap();
        assert_eq!(store.content(&legacy), "plain words");

        assert_eq!(store.encrypt_plaintext_notes().await.unwrap(), 1);
        let migrated = store.read("old").await.unwrap().unwrap();
        assert!(migrated.is_encrypted);
        assert_ne!(migrated.content, "plain words");
        assert_eq!(migrated.updated_at, 2);
        assert_eq!(store.content(&migrated), "plain words");

        assert_eq!(store.encrypt_plaintext_notes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_and_filters() {
        let store = store();
        store.create("open", "").await.unwrap();
        store.update_content("open", "hello world").await.unwrap();
        store.create("blank", "").await.unwrap();
        store.create("priv", "").await.unwrap();
        store
            .update("priv", edit("secret", PasswordAction::Change("p".into()), false))
            .await
            .unwrap();
        store.create("prot", "").await.unwrap();
        store
            .update("prot", edit("shown", PasswordAction::Change("p".into()), true))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            (stats.total, stats.public, stats.private, stats.protected, stats.empty),
            (4, 2, 1, 1, 1)
        );
        let mut recent: Vec<&str> = stats.recent.iter().map(|n| n.key.as_str()).collect();
        recent.sort_unstable();
        assert_eq!(recent, ["blank", "open", "priv", "prot"]);

        let page = store
            .list_page(&ListQuery {
                filter: NoteFilter::Private,
                page: 1,
                limit: 10,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.notes.first().map(|n| n.key.as_str()), Some("priv"));

        let page = store
            .list_page(&ListQuery {
                search: Some("WORLD".into()),
                page: 1,
                limit: 10,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.notes.first().map(|n| n.key.as_str()), Some("open"));
    }

    #[tokio::test]
    async fn stats_keep_ten_most_recent() {
        let store = store();
        for i in 0..12i64 {
            store
                .write(&Note {
                    key: format!("note{i:02}"),
                    content: String::new(),
                    password_hash: None,
                    is_public: false,
                    created_at: i,
                    updated_at: 100 + i,
                    is_encrypted: true,
                })
                .await
                .unwrap();
        }

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 12);
        assert_eq!(stats.recent.len(), RECENT_NOTES);
        assert_eq!(stats.recent.first().map(|n| n.key.as_str()), Some("note11"));
        assert_eq!(stats.recent.last().map(|n| n.key.as_str()), Some("note02"));
        assert!(stats.recent.iter().all(|n| n.is_empty));
    }

    #[tokio::test]
    async fn detail_opens_content() {
        let store = store();
        store.create("shown", "hello there").await.unwrap();

        let detail = store.detail("shown").await.unwrap().unwrap();
        assert_eq!(detail.content, "hello there");
        assert_eq!(detail.summary.key, "shown");
        assert!(!detail.summary.is_empty);
        assert!(store.detail("absent").await.unwrap().is_none());

        let mut sealed = store.read("shown").await.unwrap().unwrap();
        sealed.content = "bm90IGNpcGhlcnRleHQgYXQgYWxsIQ==".into();
        store.write(&sealed).await.unwrap();
        let detail = store.detail("shown").await.unwrap().unwrap();
        assert_eq!(detail.content, DECRYPTION_PLACEHOLDER);
    }

    #[tokio::test]
    async fn pagination_orders_by_recent_update() {
        let store = store();
        for (i, key) in ["aaa", "bbb", "ccc"].iter().enumerate() {
            let ts = i64::try_from(i).unwrap();
            store
                .write(&Note {
                    key: (*key).into(),
                    content: String::new(),
                    password_hash: None,
                    is_public: false,
                    created_at: ts,
                    updated_at: ts,
                    is_encrypted: true,
                })
                .await
                .unwrap();
        }

        let first = store
            .list_page(&ListQuery {
                page: 1,
                limit: 2,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages, 2);
        let keys: Vec<_> = first.notes.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["ccc", "bbb"]);

        let second = store
            .list_page(&ListQuery {
                page: 2,
                limit: 2,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        let keys: Vec<_> = second.notes.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, ["aaa"]);
    }
}
