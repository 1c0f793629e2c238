//! Note and admin password hashing.
//!
//! Hashes are stored as `pbkdf2$<iterations>$<b64 salt>$<b64 hash>` using
//! PBKDF2-HMAC-SHA256 with a random 16-byte salt. Verification reads the
//! iteration count from the stored string, so hashes written with a
//! different work factor keep verifying. Bare 64-char hex strings are
//! accepted as legacy unsalted SHA-256 hashes.
//!
//! Request paths use [`spawn_hash_password`] and [`spawn_verify_password`],
//! which run the PBKDF2 rounds on the blocking pool.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::task::JoinError;
use tracing::warn;

/// Default PBKDF2 work factor for new password hashes.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Upper bound accepted when verifying, so a hostile hash cannot stall a worker.
pub const MAX_ITERATIONS: u32 = 10_000_000;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const PREFIX: &str = "pbkdf2$";

/// Hash a password with the default work factor.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

/// Hash a password with an explicit PBKDF2 iteration count.
#[must_use]
pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let iterations = iterations.max(1);
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let derived = derive(password, &salt, iterations);
    format!(
        "{PREFIX}{iterations}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(derived)
    )
}

/// Check a candidate password against a stored hash in constant time.
///
/// Returns `false` for empty or unparseable hashes rather than erroring.
#[must_use]
pub fn verify_password(candidate: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }

    if let Some(rest) = stored.strip_prefix(PREFIX) {
        return verify_pbkdf2(candidate, rest);
    }

    verify_legacy(candidate, stored)
}

/// [`hash_password_with_iterations`] on the blocking pool.
///
/// # Errors
///
/// Returns the [`JoinError`] if the hashing task panicked.
pub async fn spawn_hash_password(password: &str, iterations: u32) -> Result<String, JoinError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password_with_iterations(&password, iterations)).await
}

/// [`verify_password`] on the blocking pool. A panicked task is a mismatch.
pub async fn spawn_verify_password(candidate: &str, stored: &str) -> bool {
    let (candidate, stored) = (candidate.to_owned(), stored.to_owned());
    tokio::task::spawn_blocking(move || verify_password(&candidate, &stored))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "password check task failed");
            false
        })
}

fn verify_pbkdf2(candidate: &str, rest: &str) -> bool {
    let mut parts = rest.split('$');
    let (Some(iterations), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return false;
    }

    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
        return false;
    };
    if expected.len() != HASH_LEN {
        return false;
    }

    let derived = derive(candidate, &salt, iterations);
    derived.ct_eq(expected.as_slice()).into()
}

fn verify_legacy(candidate: &str, stored: &str) -> bool {
    let Ok(stored_bytes) = hex::decode(stored) else {
        return false;
    };
    let digest = Sha256::digest(candidate.as_bytes());
    if stored_bytes.len() != digest.len() {
        return false;
    }
    digest.as_slice().ct_eq(stored_bytes.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}
