//! # Paygate
//!
//! Pay-once, unlimited-reuse access to encrypted content.
//!
//! A requester pays a fixed fee the first time they unlock a piece of
//! content. The payment is recorded in a shared ledger, and every later
//! request for the same (content, requester) pair goes through without
//! paying again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paygate::{Paygate, PaygateConfig};
//! use paygate::core::PaymentInstrument;
//! use paygate::session::{KeypairSigner, RequesterSigner};
//!
//! async fn example() -> paygate::Result<()> {
//!     let gate = Paygate::bootstrap(PaygateConfig::default())?;
//!     let content = gate.publish(b"chapter one").await?;
//!
//!     let wallet = KeypairSigner::generate();
//!     let mut coin = PaymentInstrument::new(wallet.requester(), 5_000_000u64);
//!     let plaintext = gate.unlock(&content, &wallet, &mut coin).await?;
//!     assert_eq!(&plaintext[..], b"chapter one");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `paygate::core` - identifiers, amounts, instruments, crypto
//! - `paygate::ledger` - payment ledger backends and the access gate
//! - `paygate::session` - session credentials and signers
//! - `paygate::pipeline` - the authorization pipeline and collaborators

pub mod config;
pub mod error;
pub mod paygate;

pub use paygate_core as core;
pub use paygate_ledger as ledger;
pub use paygate_pipeline as pipeline;
pub use paygate_session as session;

pub use config::{LedgerSection, PaygateConfig, PipelineSection, SessionSection};
pub use error::{PaygateError, Result};
pub use paygate::Paygate;

pub use paygate_core::{AccessDecision, Amount, ContentId, PaymentInstrument, RequesterId};
pub use paygate_pipeline::{FailureReport, PipelineError, Recoverability, Stage};
