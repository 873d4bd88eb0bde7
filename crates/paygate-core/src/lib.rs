//! # Paygate Core
//!
//! Pure primitives for pay-once, unlimited-reuse access to encrypted content.
//!
//! This crate contains no I/O, no storage, no networking. It defines the
//! identities, value types and signed-statement encoding shared by the
//! ledger, session and pipeline crates.
//!
//! ## Key Types
//!
//! - [`ContentId`] - Opaque reference to one unit of encrypted content
//! - [`RequesterId`] - Opaque identity of the paying principal
//! - [`PaymentInstrument`] - A presented, inspectable bundle of value
//! - [`AccessDecision`] - Tri-state outcome of a gate evaluation
//!
//! ## Canonicalization
//!
//! Signed statements (session challenges, key-release requests, evaluation
//! proofs) are encoded as deterministic CBOR maps. See [`canonical`].

pub mod canonical;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod payment;
pub mod types;

pub use canonical::Statement;
pub use clock::now_millis;
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use payment::{AccessDecision, Amount, PaymentInstrument};
pub use types::{ContentId, RequesterId};
