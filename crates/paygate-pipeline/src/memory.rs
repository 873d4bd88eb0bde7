//! In-process collaborators.
//!
//! [`MemoryBlobStore`] stands in for the blob network and
//! [`LocalKeyServer`] for the threshold key service. Both are safe to share
//! across concurrent pipelines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use paygate_core::{now_millis, ContentId, Ed25519Signature};
use paygate_ledger::PaymentLedger;
use paygate_session::SessionCredential;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::collaborators::{BlobStore, ContentFetcher, DecryptError, DecryptionService, FetchError};
use crate::crypto::ContentKey;
use crate::envelope::SealedContent;
use crate::error::EnvelopeError;
use crate::request::EvaluationProof;

/// Content-addressed blob store held in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentId, Bytes>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put bytes under an arbitrary identifier, bypassing addressing.
    pub async fn insert_raw(&self, content: ContentId, blob: Bytes) {
        self.blobs.write().await.insert(content, blob);
    }

    /// Simulate a network partition: every fetch and store fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn check_online(&self) -> Result<(), FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("blob store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for MemoryBlobStore {
    async fn fetch(&self, content: &ContentId) -> Result<Bytes, FetchError> {
        self.check_online()?;
        let blobs = self.blobs.read().await;
        match blobs.get(content) {
            Some(blob) if blob.is_empty() => Err(FetchError::Empty),
            Some(blob) => Ok(blob.clone()),
            None => Err(FetchError::NotFound(content.to_hex())),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, blob: Bytes) -> Result<ContentId, FetchError> {
        self.check_online()?;
        if blob.is_empty() {
            return Err(FetchError::Empty);
        }
        let content = ContentId::derive(&blob);
        self.blobs.write().await.insert(content.clone(), blob);
        Ok(content)
    }
}

/// Key server that releases plaintext only for paid, authorized requests.
///
/// Release requires, in order: an intact evaluation proof, a credential for
/// the proof's requester that is signed and unexpired, a valid session-key
/// signature over the release message, and a payment visible in the
/// ledger. Any miss is `Denied`. A missing key or a bad envelope is
/// `Failed`.
pub struct LocalKeyServer<L: PaymentLedger> {
    ledger: Arc<L>,
    keys: RwLock<HashMap<ContentId, ContentKey>>,
}

impl<L: PaymentLedger> LocalKeyServer<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Encrypt `plaintext` under a fresh key and register that key.
    ///
    /// Returns the content address and the envelope bytes to store.
    pub async fn seal(&self, plaintext: &[u8]) -> Result<(ContentId, Bytes), EnvelopeError> {
        let key = ContentKey::generate();
        let envelope = Bytes::from(SealedContent::seal(plaintext, &key)?.to_bytes()?);
        let content = ContentId::derive(&envelope);
        self.keys.write().await.insert(content.clone(), key);
        debug!(%content, size = envelope.len(), "content sealed");
        Ok((content, envelope))
    }

    async fn authorize(
        &self,
        credential: &SessionCredential,
        proof: &EvaluationProof,
        request_signature: &Ed25519Signature,
    ) -> Result<(), DecryptError> {
        if !proof.is_intact() {
            return Err(DecryptError::Denied("evaluation proof does not verify".into()));
        }
        if credential.requester() != &proof.requester {
            return Err(DecryptError::Denied(
                "credential and proof name different requesters".into(),
            ));
        }
        credential
            .verify(now_millis())
            .map_err(|e| DecryptError::Denied(e.to_string()))?;

        credential
            .verify_request(&proof.release_message(), request_signature)
            .map_err(|_| DecryptError::Denied("request signature does not verify".into()))?;

        let paid = self
            .ledger
            .has_payment(&proof.content, &proof.requester)
            .await
            .map_err(|e| DecryptError::Denied(format!("ledger unavailable: {e}")))?;
        if !paid {
            return Err(DecryptError::Denied("payment not visible in ledger".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<L: PaymentLedger> DecryptionService for LocalKeyServer<L> {
    async fn decrypt(
        &self,
        ciphertext: &Bytes,
        credential: &SessionCredential,
        proof: &EvaluationProof,
        request_signature: &Ed25519Signature,
    ) -> Result<Bytes, DecryptError> {
        if let Err(e) = self.authorize(credential, proof, request_signature).await {
            warn!(content = %proof.content, requester = %proof.requester, error = %e, "key release denied");
            return Err(e);
        }

        if ContentId::derive(ciphertext) != proof.content {
            return Err(DecryptError::Failed(
                "ciphertext does not match content address".into(),
            ));
        }

        let keys = self.keys.read().await;
        let key = keys
            .get(&proof.content)
            .ok_or_else(|| DecryptError::Failed(format!("no key for {}", proof.content)))?;
        let plaintext = SealedContent::from_bytes(ciphertext)
            .and_then(|sealed| sealed.open(key))
            .map_err(|e| DecryptError::Failed(e.to_string()))?;

        info!(content = %proof.content, requester = %proof.requester, "key released");
        Ok(Bytes::from(plaintext))
    }
}
