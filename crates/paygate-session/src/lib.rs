//! # Paygate Session
//!
//! Off-chain, time-bounded credentials proving that a requester authorized
//! one decryption attempt.
//!
//! ## Overview
//!
//! A [`SessionCredential`] is created per decryption attempt with a fresh
//! ephemeral session key. Its [`challenge`](SessionCredential::challenge)
//! is a canonical statement binding the requester, the session key and the
//! validity window. The requester's wallet signs the challenge out-of-band
//! (see [`RequesterSigner`]); [`SessionCredential::sign`] verifies that
//! signature before binding it. From then on the session key signs
//! key-release requests on the requester's behalf until the TTL runs out.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──> challenge ──> wallet signs ──> sign ──> use once ──> drop
//! ```
//!
//! Credentials are single-use in intent and are never persisted. They are
//! not `Clone`; dropping one (on success, failure, or when the owning future
//! is cancelled) releases it, which [`SessionAuthorizer::active_sessions`]
//! makes observable.

pub mod authorizer;
pub mod credential;
pub mod error;
pub mod signer;

pub use authorizer::{SessionAuthorizer, SessionConfig};
pub use credential::SessionCredential;
pub use error::{Result, SessionError};
pub use signer::{DeclineReason, KeypairSigner, RequesterSigner};
