//! AES-256-GCM encryption of application secrets at rest.
//!
//! Unlike passwords, application secrets must be recoverable in plaintext,
//! so they are encrypted rather than hashed. Ciphertext strings are
//! self-contained: `base64(nonce ‖ ciphertext ‖ tag)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum SecretCipherError {
    #[error("APP_SECRET_ENCRYPTION_KEY must be 32 bytes when base64 decoded")]
    InvalidKey,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,
}

/// Symmetric cipher for per-application secrets.
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Build from a base64-encoded 32-byte key. Anything that does not
    /// decode to exactly 32 bytes is a configuration error.
    pub fn new(key_b64: &str) -> Result<Self, SecretCipherError> {
        let key_bytes = STANDARD
            .decode(key_b64)
            .map_err(|_| SecretCipherError::InvalidKey)?;

        if key_bytes.len() != 32 {
            return Err(SecretCipherError::InvalidKey);
        }

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a secret. A fresh random nonce per call makes the output
    /// non-deterministic even for identical plaintexts.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecretCipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| SecretCipherError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a ciphertext string produced by [`encrypt`](Self::encrypt).
    /// Fails on truncated or tampered input.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, SecretCipherError> {
        let combined = STANDARD
            .decode(ciphertext_b64)
            .map_err(|_| SecretCipherError::DecryptionFailed)?;

        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(SecretCipherError::DecryptionFailed);
        }

        let nonce = Nonce::from_slice(&combined[..NONCE_LEN]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &combined[NONCE_LEN..])
            .map_err(|_| SecretCipherError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| SecretCipherError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "MDEyMzQ1Njc4OUFCQ0RFRjAxMjM0NTY3ODlBQkNERUY=";

    #[test]
    fn roundtrip_recovers_plaintext() {
        let cipher = SecretCipher::new(TEST_KEY).unwrap();

        for secret in ["short", "a longer application secret value", "unicode αβγ"] {
            let encrypted = cipher.encrypt(secret).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), secret);
        }
    }

    #[test]
    fn encryption_is_non_deterministic() {
        let cipher = SecretCipher::new(TEST_KEY).unwrap();

        let a = cipher.encrypt("same input").unwrap();
        let b = cipher.encrypt("same input").unwrap();

        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), "same input");
        assert_eq!(cipher.decrypt(&b).unwrap(), "same input");
    }

    #[test]
    fn rejects_wrong_key_length() {
        let short = STANDARD.encode("sixteen byte key");
        assert!(matches!(
            SecretCipher::new(&short),
            Err(SecretCipherError::InvalidKey)
        ));
        assert!(matches!(
            SecretCipher::new("not base64!!!"),
            Err(SecretCipherError::InvalidKey)
        ));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let cipher = SecretCipher::new(TEST_KEY).unwrap();
        let encrypted = cipher.encrypt("secret").unwrap();

        let mut raw = STANDARD.decode(&encrypted).unwrap();
        raw[NONCE_LEN + 1] ^= 0xff;
        let tampered = STANDARD.encode(raw);

        assert!(cipher.decrypt(&tampered).is_err());
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let cipher = SecretCipher::new(TEST_KEY).unwrap();
        assert!(cipher.decrypt(&STANDARD.encode([0u8; 8])).is_err());
    }

    #[test]
    fn different_keys_are_incompatible() {
        let other_key = STANDARD.encode([7u8; 32]);
        let cipher_a = SecretCipher::new(TEST_KEY).unwrap();
        let cipher_b = SecretCipher::new(&other_key).unwrap();

        let encrypted = cipher_a.encrypt("secret").unwrap();
        assert!(cipher_b.decrypt(&encrypted).is_err());
    }
}
