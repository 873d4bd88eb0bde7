//! Session credentials.
//!
//! A credential moves through `unsigned -> signed -> dropped`. It is
//! checked in two places: the pipeline before key release, and the
//! decryption service, which re-derives the challenge and verifies both
//! the requester's signature and the session key's request signature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use paygate_core::{
    now_millis, Ed25519PublicKey, Ed25519Signature, Keypair, RequesterId, Statement,
};

use crate::error::{Result, SessionError};

/// Statement field keys.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const DOMAIN: u64 = 0;
    pub const REQUESTER: u64 = 1;
    pub const SESSION_KEY: u64 = 2;
    pub const CREATED_AT: u64 = 3;
    pub const TTL_MINUTES: u64 = 4;
}

const MILLIS_PER_MINUTE: i64 = 60_000;

/// A time-bounded proof that a requester authorized one decryption attempt.
pub struct SessionCredential {
    domain: String,
    requester: RequesterId,
    principal: Ed25519PublicKey,
    session_key: Keypair,
    created_at: i64,
    ttl_minutes: u32,
    signature: Option<Ed25519Signature>,
    active: Arc<AtomicUsize>,
}

impl SessionCredential {
    pub(crate) fn new(
        domain: String,
        requester: RequesterId,
        principal: Ed25519PublicKey,
        created_at: i64,
        ttl_minutes: u32,
        active: Arc<AtomicUsize>,
    ) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            domain,
            requester,
            principal,
            session_key: Keypair::generate(),
            created_at,
            ttl_minutes,
            signature: None,
            active,
        }
    }

    /// Who this session acts for.
    pub fn requester(&self) -> &RequesterId {
        &self.requester
    }

    /// Public half of the ephemeral session key.
    pub fn session_public_key(&self) -> Ed25519PublicKey {
        self.session_key.public_key()
    }

    /// Creation time (Unix ms).
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Validity window in minutes.
    pub fn ttl_minutes(&self) -> u32 {
        self.ttl_minutes
    }

    /// First instant (Unix ms) at which the credential is expired.
    pub fn expires_at(&self) -> i64 {
        self.created_at
            .saturating_add(i64::from(self.ttl_minutes) * MILLIS_PER_MINUTE)
    }

    /// The requester's signature, once bound.
    pub fn signature(&self) -> Option<&Ed25519Signature> {
        self.signature.as_ref()
    }

    /// The canonical bytes the requester must sign.
    pub fn challenge(&self) -> Vec<u8> {
        Statement::new()
            .text(keys::DOMAIN, self.domain.as_str())
            .bytes(keys::REQUESTER, self.requester.as_bytes())
            .bytes(keys::SESSION_KEY, self.session_key.public_key().as_bytes())
            .int(keys::CREATED_AT, self.created_at)
            .uint(keys::TTL_MINUTES, u64::from(self.ttl_minutes))
            .encode()
    }

    /// Bind the requester's signature, completing the credential.
    ///
    /// The signature must verify against the requester's principal over
    /// [`challenge`](Self::challenge).
    pub fn sign(&mut self, signature: Ed25519Signature) -> Result<()> {
        if self.signature.is_some() {
            return Err(SessionError::AlreadySigned);
        }
        self.principal
            .verify(&self.challenge(), &signature)
            .map_err(|_| SessionError::SignatureRejected)?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Whether the requester's signature has been bound.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Whether the credential is expired at `now` (Unix ms).
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// Full validity check at `now`: signed, unexpired, signature intact.
    pub fn verify(&self, now: i64) -> Result<()> {
        let signature = self.signature.as_ref().ok_or(SessionError::NotSigned)?;
        if self.is_expired(now) {
            return Err(SessionError::Expired {
                expired_at: self.expires_at(),
            });
        }
        self.principal
            .verify(&self.challenge(), signature)
            .map_err(|_| SessionError::SignatureRejected)
    }

    /// Sign a request with the session key.
    ///
    /// Only a signed, unexpired credential may speak for the requester.
    pub fn sign_request(&self, message: &[u8]) -> Result<Ed25519Signature> {
        self.verify(now_millis())?;
        Ok(self.session_key.sign(message))
    }

    /// Check a request signature made by this credential's session key.
    pub fn verify_request(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        self.session_public_key()
            .verify(message, signature)
            .map_err(|_| SessionError::SignatureRejected)
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("requester", &self.requester)
            .field("session_key", &self.session_key.public_key())
            .field("created_at", &self.created_at)
            .field("ttl_minutes", &self.ttl_minutes)
            .field("signed", &self.signature.is_some())
            .finish()
    }
}

impl Drop for SessionCredential {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(requester = %self.requester, "session credential discarded");
    }
}
