//! Content encryption for notes.
//!
//! One static AES-256-GCM key protects every note in a deployment. It is
//! derived once at startup from the configured passphrase and salt with
//! PBKDF2-HMAC-SHA256 and held in a zeroize-on-drop newtype.
//!
//! # Format
//!
//! - Every seal generates a fresh 96-bit nonce via `OsRng`.
//! - Stored form: `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`.
//! - Empty plaintext seals to the empty string and opens back to it.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::Sha256;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Minimum ciphertext length: 12-byte nonce + 16-byte AES-GCM tag.
const MIN_CIPHERTEXT_LEN: usize = 12 + 16;

const NONCE_LEN: usize = 12;

/// PBKDF2 rounds used to derive the content key.
pub const KEY_DERIVATION_ITERATIONS: u32 = 100_000;

/// Text shown in place of content that could not be decrypted.
pub const DECRYPTION_PLACEHOLDER: &str = "[decryption failed]";

/// Development passphrase used when none is configured. Never use in production.
pub const DEV_PASSPHRASE: &str = "yonote-dev-encryption-key-change-me";

/// Development salt paired with [`DEV_PASSPHRASE`].
pub const DEV_SALT: &str = "yonote-dev-salt-change-me";

/// A 256-bit encryption key that is zeroized on drop.
///
/// The inner bytes are never exposed in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// A random key, for throwaway stores in tests and dev tooling.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Aes256Gcm::generate_key(OsRng));
        Self(bytes)
    }

    /// Derive a key from a passphrase and salt with PBKDF2-HMAC-SHA256.
    ///
    /// Deterministic: the same passphrase and salt always give the same key,
    /// which is what lets a restarted server read its own notes.
    #[must_use]
    pub fn derive(passphrase: &str, salt: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            salt,
            KEY_DERIVATION_ITERATIONS,
            &mut bytes,
        );
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Encrypt bytes with AES-256-GCM under a fresh random nonce.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut combined = Vec::with_capacity(NONCE_LEN.saturating_add(ciphertext.len()));
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt bytes produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if the input cannot hold a
/// nonce and tag, and [`CryptoError::Decryption`] if authentication fails.
pub fn decrypt(key: &EncryptionKey, combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if combined.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            expected: MIN_CIPHERTEXT_LEN,
            actual: combined.len(),
        });
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Decryption {
            reason: e.to_string(),
        })
}

/// Seals and opens note content as base64 text.
#[derive(Clone)]
pub struct ContentCipher {
    key: EncryptionKey,
}

impl ContentCipher {
    /// Wrap an already-derived key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Derive the deployment key from a passphrase and salt.
    #[must_use]
    pub fn from_passphrase(passphrase: &str, salt: &str) -> Self {
        Self::new(EncryptionKey::derive(passphrase, salt.as_bytes()))
    }

    /// Seal note text. Empty text stays empty.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let sealed = encrypt(&self.key, plaintext.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Open sealed note text.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encoding`] for invalid base64, a decryption
    /// error for a wrong key or tampered data, and
    /// [`CryptoError::InvalidUtf8`] if the plaintext is not text.
    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        if sealed.is_empty() {
            return Ok(String::new());
        }
        let combined = STANDARD
            .decode(sealed.trim())
            .map_err(|e| CryptoError::Encoding {
                reason: e.to_string(),
            })?;
        let plaintext = decrypt(&self.key, &combined)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// Open sealed note text, substituting [`DECRYPTION_PLACEHOLDER`] on
    /// failure.
    ///
    /// The failure is logged at `warn` so corrupted rows stay visible to
    /// operators even though the page still renders.
    pub fn open_or_placeholder(&self, note_key: &str, sealed: &str) -> String {
        match self.open(sealed) {
            Ok(text) => text,
            Err(e) => {
                warn!(note = %note_key, error = %e, "note content could not be decrypted");
                DECRYPTION_PLACEHOLDER.to_owned()
            }
        }
    }
}

impl fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCipher").finish_non_exhaustive()
    }
}
