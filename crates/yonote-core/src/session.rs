//! Signed per-browser set of unlocked notes.
//!
//! After a visitor passes a note's password challenge the note key is added
//! to an [`AuthSet`], which travels back and forth in a cookie as
//! `v1.<base64url(json)>.<base64url(hmac-sha256)>`. The server keeps no
//! session state of its own. Anything that fails to decode or verify is
//! treated as an empty set.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v1";

/// Note keys whose password this browser has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSet {
    keys: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    keys: BTreeMap<String, bool>,
}

impl AuthSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns `true` if the key was not already present.
    pub fn insert(&mut self, key: &str) -> bool {
        self.keys.insert(key.to_owned())
    }

    /// Returns `true` if the key was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Signs and verifies [`AuthSet`] tokens with HMAC-SHA256.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionSigner {
    /// Build a signer from the session secret.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSecret`] for an empty secret, or one
    /// the MAC rejects.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::InvalidSecret {
                reason: "secret is empty".to_owned(),
            });
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|e| {
            SessionError::InvalidSecret {
                reason: e.to_string(),
            }
        })?;
        Ok(Self { mac })
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Serialize and sign a set.
    #[must_use]
    pub fn encode(&self, set: &AuthSet) -> String {
        let payload = Payload {
            keys: set.keys.iter().map(|k| (k.clone(), true)).collect(),
        };
        // A map of strings to bools always serializes.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        format!("{VERSION}.{payload}.{signature}")
    }

    /// Verify and parse a token.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Malformed`] if the token is not three dot-separated parts.
    /// - [`SessionError::UnsupportedVersion`] for a version other than `v1`.
    /// - [`SessionError::BadSignature`] if the HMAC does not match.
    /// - [`SessionError::Payload`] if the signed payload is not the expected JSON.
    pub fn decode(&self, token: &str) -> Result<AuthSet, SessionError> {
        let mut parts = token.split('.');
        let (Some(version), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Malformed);
        };

        if version != VERSION {
            return Err(SessionError::UnsupportedVersion {
                version: version.to_owned(),
            });
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::BadSignature)?;
        let expected = self.sign(payload);
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(SessionError::BadSignature);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| SessionError::Payload {
                reason: e.to_string(),
            })?;
        let parsed: Payload = serde_json::from_slice(&json).map_err(|e| SessionError::Payload {
            reason: e.to_string(),
        })?;

        Ok(AuthSet {
            keys: parsed
                .keys
                .into_iter()
                .filter_map(|(k, v)| v.then_some(k))
                .collect(),
        })
    }

    /// Decode a cookie value, treating anything invalid as an empty set.
    #[must_use]
    pub fn decode_or_empty(&self, token: Option<&str>) -> AuthSet {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return AuthSet::new();
        };
        self.decode(token).unwrap_or_else(|e| {
            debug!(error = %e, "discarding invalid session token");
            AuthSet::new()
        })
    }
}
