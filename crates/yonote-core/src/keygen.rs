//! Short note keys.
//!
//! Auto-generated keys are 3 to 7 lowercase ASCII letters drawn from the OS
//! CSPRNG. User-chosen keys may be anything matching [`validate_key`].

use rand::Rng;
use rand::rngs::OsRng;

use crate::error::NoteError;

/// Shortest generated key.
pub const MIN_GENERATED_LEN: usize = 3;

/// Longest generated key.
pub const MAX_GENERATED_LEN: usize = 7;

/// Shortest accepted key.
pub const MIN_KEY_LEN: usize = 3;

/// Longest accepted key.
pub const MAX_KEY_LEN: usize = 128;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Generate a random lowercase key of 3 to 7 letters.
#[must_use]
pub fn generate_key() -> String {
    let mut rng = OsRng;
    let len = rng.gen_range(MIN_GENERATED_LEN..=MAX_GENERATED_LEN);
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            char::from(ALPHABET.get(idx).copied().unwrap_or(b'a'))
        })
        .collect()
}

/// Check that a key is 3 to 128 characters of `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns [`NoteError::InvalidKey`] describing the first problem found.
pub fn validate_key(key: &str) -> Result<(), NoteError> {
    let len = key.len();
    if len < MIN_KEY_LEN {
        return Err(NoteError::InvalidKey {
            reason: format!("key must be at least {MIN_KEY_LEN} characters"),
        });
    }
    if len > MAX_KEY_LEN {
        return Err(NoteError::InvalidKey {
            reason: format!("key must be at most {MAX_KEY_LEN} characters"),
        });
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(NoteError::InvalidKey {
            reason: format!("character {c:?} is not allowed"),
        });
    }
    Ok(())
}

/// Whether `key` passes [`validate_key`].
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    validate_key(key).is_ok()
}
