//! Identity types for paygate.
//!
//! Content and requester identifiers are opaque byte strings wrapped in
//! newtypes so they cannot be swapped at a call site.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::{CoreError, Result};

const CONTENT_ID_CONTEXT: &str = "paygate content-id v1";

/// Opaque identifier of one unit of encrypted content.
///
/// Typically a blob reference in the content store. Immutable once the
/// content is published; used as the outer key of the payment ledger.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(Bytes);

impl ContentId {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Derive a content address from stored ciphertext.
    pub fn derive(ciphertext: &[u8]) -> Self {
        let hash = Blake3Hash::derive(CONTENT_ID_CONTEXT, &[ciphertext]);
        Self(Bytes::copy_from_slice(hash.as_bytes()))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        Ok(Self(Bytes::from(hex::decode(s)?)))
    }

    /// Whether the identifier is empty (never a valid reference).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        short_hex(f, &self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Vec<u8>> for ContentId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl AsRef<[u8]> for ContentId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Opaque identifier of a paying principal (e.g. an account address).
///
/// Immutable for the lifetime of a request. A requester can authorize
/// decryption sessions only if it resolves to an Ed25519 key, see
/// [`RequesterId::principal`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(Bytes);

impl RequesterId {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Resolve to the Ed25519 principal that signs on this requester's behalf.
    pub fn principal(&self) -> Result<Ed25519PublicKey> {
        let bytes: [u8; 32] = self
            .0
            .as_ref()
            .try_into()
            .map_err(|_| CoreError::UnresolvablePrincipal(self.to_string()))?;
        let key = Ed25519PublicKey::from_bytes(bytes);
        if !key.is_valid() {
            return Err(CoreError::UnresolvablePrincipal(self.to_string()));
        }
        Ok(key)
    }
}

impl fmt::Debug for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequesterId({})", self)
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        short_hex(f, &self.0)
    }
}

impl From<Ed25519PublicKey> for RequesterId {
    fn from(key: Ed25519PublicKey) -> Self {
        Self(Bytes::copy_from_slice(key.as_bytes()))
    }
}

impl From<&str> for RequesterId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl AsRef<[u8]> for RequesterId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn short_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    let hex = hex::encode(bytes);
    if hex.len() > 16 {
        write!(f, "{}", &hex[..16])
    } else {
        write!(f, "{}", hex)
    }
}
