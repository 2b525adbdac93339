//! Scrypt-derived key + AES-256-GCM sealed envelope.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::Params as ScryptParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

/// Errors from sealing or opening a credential envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad scrypt parameters).
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// AEAD seal/open failed (wrong key, or tampered ciphertext).
    #[error("decryption failed")]
    Aead,

    /// The envelope's base64/serialised shape was invalid.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// A master passphrase, used to derive a per-credential AES-256 key via
/// scrypt. Never logged: does not implement `Debug`/`Display`.
pub struct MasterKey(String);

impl MasterKey {
    /// Wrap a master passphrase (from the `CREDENTIAL_MASTER_KEY`
    /// environment variable, spec §6).
    #[must_use]
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A sealed secret, safe to persist to disk or a database column.
///
/// `salt` and `nonce` are stored alongside the ciphertext rather than
/// derived, so the same master key produces a fresh key/nonce pair on
/// every seal (required for AES-GCM: nonce reuse under the same key
/// breaks confidentiality).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// scrypt salt, base64-encoded.
    pub salt: String,
    /// AES-GCM nonce, base64-encoded.
    pub nonce: String,
    /// Ciphertext (plaintext + AEAD tag), base64-encoded.
    pub ciphertext: String,
}

impl Envelope {
    /// Seal `plaintext` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Kdf`] if key derivation fails.
    pub fn seal(key: &MasterKey, plaintext: &str) -> CryptoResult<Self> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let derived = derive_key(&key.0, &salt)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Aead)?;

        Ok(Self {
            salt: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, salt),
            nonce: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, nonce_bytes),
            ciphertext: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, ciphertext),
        })
    }

    /// Open the envelope under `key`, recovering the original plaintext.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Malformed`] if the base64 fields are invalid;
    /// [`CryptoError::Aead`] if the key is wrong or the ciphertext was
    /// tampered with.
    pub fn open(&self, key: &MasterKey) -> CryptoResult<String> {
        use base64::Engine as _;
        let salt = base64::engine::general_purpose::STANDARD
            .decode(&self.salt)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let nonce_bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.nonce)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let derived = derive_key(&key.0, &salt)?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&derived));
        let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| CryptoError::Aead)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> CryptoResult<[u8; KEY_LEN]> {
    let params = ScryptParams::new(15, 8, 1, KEY_LEN).map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let mut out = [0u8; KEY_LEN];
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut out).map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = MasterKey::new("correct horse battery staple");
        let envelope = Envelope::seal(&key, "sk-ant-abc123").unwrap();
        let opened = envelope.open(&key).unwrap();
        assert_eq!(opened, "sk-ant-abc123");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let key = MasterKey::new("correct horse battery staple");
        let wrong = MasterKey::new("not the right passphrase");
        let envelope = Envelope::seal(&key, "sk-ant-abc123").unwrap();
        assert!(matches!(envelope.open(&wrong), Err(CryptoError::Aead)));
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = MasterKey::new("correct horse battery staple");
        let mut envelope = Envelope::seal(&key, "sk-ant-abc123").unwrap();
        envelope.ciphertext = Envelope::seal(&key, "different-secret").unwrap().ciphertext;
        assert!(matches!(envelope.open(&key), Err(CryptoError::Aead)));
    }

    #[test]
    fn two_seals_of_the_same_plaintext_use_distinct_nonces() {
        let key = MasterKey::new("correct horse battery staple");
        let a = Envelope::seal(&key, "same-secret").unwrap();
        let b = Envelope::seal(&key, "same-secret").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
