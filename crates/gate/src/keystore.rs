//! Credential storage and key utilities.
//!
//! API keys are kept as SHA-256 digests; the plaintext is discarded after
//! load. Validation hashes the presented credential and looks the digest
//! up in the active set, so the secret itself is never string-compared.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore as _;
use rand::rngs::OsRng;
use sha2::{Digest as _, Sha256};

type KeyDigest = [u8; 32];

/// Authoritative membership test for API key credentials.
///
/// The active set is replaced wholesale under a write lock, so concurrent
/// readers observe either the previous complete set or the new one, never
/// a mix.
pub struct KeyStore {
    keys: RwLock<HashSet<KeyDigest>>,
}

impl KeyStore {
    /// Create an empty key store. No credential validates until `load` is
    /// called.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashSet::new()),
        }
    }

    /// Atomically replace the active key set. Used at startup and on
    /// configuration reload.
    pub fn load<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let next: HashSet<KeyDigest> = keys.into_iter().map(|key| digest(key.as_ref())).collect();

        log::debug!("Key store loaded with {} active keys", next.len());

        let mut active = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        *active = next;
    }

    /// Whether the presented credential is in the active set. Empty and
    /// malformed credentials simply fail validation.
    pub fn is_valid(&self, credential: &str) -> bool {
        if credential.is_empty() {
            return false;
        }

        let candidate = digest(credential);
        let active = self.keys.read().unwrap_or_else(PoisonError::into_inner);

        active.contains(&candidate)
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(credential: &str) -> KeyDigest {
    Sha256::digest(credential.as_bytes()).into()
}

/// The first eight hex characters of a credential's SHA-256 digest, used
/// as the rate-limit bucket for the key without exposing the key itself.
pub fn digest_prefix(credential: &str) -> String {
    hex::encode(&digest(credential)[..4])
}

/// Generate a random URL-safe API key from 32 bytes of OS entropy.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The full SHA-256 digest of an API key in hex, for secure storage.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(digest(key))
}
