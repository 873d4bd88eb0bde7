//! External services the pipeline calls into.
//!
//! These traits keep the pipeline independent of any particular blob
//! network or threshold key service. In-process versions live in
//! [`crate::memory`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use paygate_core::{ContentId, Ed25519Signature};
use paygate_session::SessionCredential;
use thiserror::Error;

use crate::request::EvaluationProof;

/// Errors from the blob store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob is empty")]
    Empty,

    #[error("store unreachable: {0}")]
    Unreachable(String),
}

/// Errors from the decryption service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The service will not release the key for this request.
    #[error("denied: {0}")]
    Denied(String),

    /// The key was available but the ciphertext could not be opened.
    #[error("failed: {0}")]
    Failed(String),
}

/// Fetches encrypted content by identifier.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, content: &ContentId) -> Result<Bytes, FetchError>;
}

/// A content-addressed store that can also accept new blobs.
#[async_trait]
pub trait BlobStore: ContentFetcher {
    /// Store `blob`, returning its content address.
    async fn store(&self, blob: Bytes) -> Result<ContentId, FetchError>;
}

/// Releases plaintext given a signed session and proof of access.
///
/// `request_signature` is the session key's signature over
/// [`EvaluationProof::release_message`]; services check it against
/// [`SessionCredential::session_public_key`].
#[async_trait]
pub trait DecryptionService: Send + Sync {
    async fn decrypt(
        &self,
        ciphertext: &Bytes,
        credential: &SessionCredential,
        proof: &EvaluationProof,
        request_signature: &Ed25519Signature,
    ) -> Result<Bytes, DecryptError>;
}

#[async_trait]
impl<T: ContentFetcher + ?Sized> ContentFetcher for Arc<T> {
    async fn fetch(&self, content: &ContentId) -> Result<Bytes, FetchError> {
        (**self).fetch(content).await
    }
}

#[async_trait]
impl<T: DecryptionService + ?Sized> DecryptionService for Arc<T> {
    async fn decrypt(
        &self,
        ciphertext: &Bytes,
        credential: &SessionCredential,
        proof: &EvaluationProof,
        request_signature: &Ed25519Signature,
    ) -> Result<Bytes, DecryptError> {
        (**self)
            .decrypt(ciphertext, credential, proof, request_signature)
            .await
    }
}
