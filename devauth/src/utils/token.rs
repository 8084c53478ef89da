use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a cryptographically secure random token.
///
/// `byte_len` bytes of OS randomness, URL-safe base64 without padding.
pub fn generate_secure_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash an opaque bearer token for storage.
///
/// Plain SHA-256, not an adaptive hash: these tokens are high-entropy random
/// values, so the work factor that protects low-entropy passwords buys
/// nothing here.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Generate a new API key, returning `(plaintext, hash)`.
///
/// Only the hash may be persisted; the plaintext is shown to the caller once.
pub fn generate_api_key() -> (String, String) {
    let plaintext = generate_secure_token(32);
    let key_hash = hash_token(&plaintext);
    (plaintext, key_hash)
}

/// Verify a token against its stored hash in constant time.
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    let computed = hash_token(token);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}
