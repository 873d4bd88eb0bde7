//! Sealed content envelope.
//!
//! Published content is stored as a CBOR envelope carrying the format tag,
//! the nonce and the authenticated ciphertext. The content identifier is the
//! Blake3 address of the envelope bytes.

use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, ContentNonce};
use crate::error::EnvelopeError;

/// Envelope format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    ChaCha20Poly1305 = 1,
}

/// Encrypted content as stored in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedContent {
    pub format: SealFormat,
    pub nonce: ContentNonce,
    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl SealedContent {
    /// Encrypt `plaintext` under `key` with a fresh nonce.
    pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<Self, EnvelopeError> {
        let nonce = ContentNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;
        Ok(Self {
            format: SealFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    pub fn open(&self, key: &ContentKey) -> Result<Vec<u8>, EnvelopeError> {
        match self.format {
            SealFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| EnvelopeError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        ciborium::from_reader(bytes).map_err(|e| EnvelopeError::Encoding(e.to_string()))
    }
}
