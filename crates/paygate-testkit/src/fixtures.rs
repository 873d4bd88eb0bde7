//! Test fixtures and helpers.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use paygate_core::{ContentId, Ed25519Signature, Keypair, PaymentInstrument, RequesterId};
use paygate_ledger::{AccessGate, GateConfig, MemoryLedger, SqliteLedger};
use paygate_session::{DeclineReason, KeypairSigner, RequesterSigner};
use tempfile::TempDir;

/// The default fee, in units.
pub const FEE: u64 = 5_000_000;

/// A requester with a keypair and helpers to mint instruments.
#[derive(Clone, Debug)]
pub struct TestWallet {
    pub keypair: Keypair,
}

impl TestWallet {
    /// A wallet with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// A wallet with a deterministic keypair.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
        }
    }

    pub fn requester(&self) -> RequesterId {
        self.keypair.requester_id()
    }

    pub fn signer(&self) -> KeypairSigner {
        KeypairSigner::new(self.keypair.clone())
    }

    /// An instrument owned by this wallet holding `units`.
    pub fn coin(&self, units: u64) -> PaymentInstrument {
        PaymentInstrument::new(self.requester(), units)
    }

    pub fn empty_instrument(&self) -> PaymentInstrument {
        PaymentInstrument::empty(self.requester())
    }
}

impl Default for TestWallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Wallets with distinct deterministic keys.
pub fn multi_party_wallets(count: usize) -> Vec<TestWallet> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
            seed[31] = 0x5a;
            TestWallet::with_seed(seed)
        })
        .collect()
}

/// A readable content identifier.
pub fn content(name: &str) -> ContentId {
    ContentId::from(name)
}

/// A gate at the default fee over a fresh in-memory ledger.
pub fn memory_gate() -> AccessGate<MemoryLedger> {
    AccessGate::new(Arc::new(MemoryLedger::new()), GateConfig::default())
}

/// A SQLite ledger file in a temporary directory, removed on drop.
pub struct DurableLedger {
    dir: TempDir,
}

impl DurableLedger {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("ledger.db")
    }

    /// Open (or reopen) the ledger.
    pub fn open(&self) -> paygate_ledger::Result<SqliteLedger> {
        SqliteLedger::open(self.path())
    }
}

/// A signer that always declines.
pub struct RefusingSigner(pub RequesterId);

#[async_trait]
impl RequesterSigner for RefusingSigner {
    fn requester(&self) -> RequesterId {
        self.0.clone()
    }

    async fn sign_challenge(&self, _challenge: &[u8]) -> Result<Ed25519Signature, DeclineReason> {
        Err(DeclineReason::Declined)
    }
}

/// A signer that never answers.
pub struct StalledSigner(pub RequesterId);

#[async_trait]
impl RequesterSigner for StalledSigner {
    fn requester(&self) -> RequesterId {
        self.0.clone()
    }

    async fn sign_challenge(&self, _challenge: &[u8]) -> Result<Ed25519Signature, DeclineReason> {
        std::future::pending().await
    }
}
