//! Symmetric content encryption.
//!
//! One ChaCha20-Poly1305 key per piece of content. Keys never leave the
//! key server; only plaintext is released.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// A 256-bit content key.
#[derive(Clone)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &ContentNonce) -> Result<Vec<u8>, EnvelopeError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::Encrypt(e.to_string()))?;
        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| EnvelopeError::Encrypt(e.to_string()))
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &ContentNonce) -> Result<Vec<u8>, EnvelopeError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| EnvelopeError::Decrypt(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| EnvelopeError::Decrypt(e.to_string()))
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// A 96-bit nonce, fresh per seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNonce(pub [u8; 12]);

impl ContentNonce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_key_fails() {
        let nonce = ContentNonce::generate();
        let ciphertext = ContentKey::generate().encrypt(b"chapter one", &nonce).unwrap();

        let result = ContentKey::generate().decrypt(&ciphertext, &nonce);

        assert!(matches!(result, Err(EnvelopeError::Decrypt(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = ContentKey::from_bytes([7u8; 32]);
        assert_eq!(format!("{key:?}"), "ContentKey(..)");
    }
}
