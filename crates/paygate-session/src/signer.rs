//! The requester side of session authorization.
//!
//! Signing happens outside this process in general: a wallet prompt, a
//! hardware device, a remote user. [`RequesterSigner`] is that seam.

use async_trait::async_trait;
use thiserror::Error;

use paygate_core::{Ed25519Signature, Keypair, RequesterId};

/// Why a requester did not produce a signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeclineReason {
    /// The requester refused to sign.
    #[error("requester declined to sign")]
    Declined,

    /// The signing channel failed.
    #[error("signing channel failed: {0}")]
    Channel(String),
}

/// Something that can sign session challenges for a requester.
#[async_trait]
pub trait RequesterSigner: Send + Sync {
    /// The identity this signer acts for.
    fn requester(&self) -> RequesterId;

    /// Sign the canonical challenge bytes of a session credential.
    async fn sign_challenge(&self, challenge: &[u8]) -> Result<Ed25519Signature, DeclineReason>;
}

/// A signer backed by an in-process keypair.
#[derive(Clone, Debug)]
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl RequesterSigner for KeypairSigner {
    fn requester(&self) -> RequesterId {
        self.keypair.requester_id()
    }

    async fn sign_challenge(&self, challenge: &[u8]) -> Result<Ed25519Signature, DeclineReason> {
        Ok(self.keypair.sign(challenge))
    }
}
