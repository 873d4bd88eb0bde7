//! # Paygate Testkit
//!
//! Shared helpers for paygate tests.
//!
//! - **Fixtures**: wallets with deterministic keys, instruments, ledgers,
//!   signers that refuse or never answer
//! - **Generators**: proptest strategies for identifiers, amounts and
//!   sequences of payment attempts
//!
//! ## Test Fixtures
//!
//! ```rust
//! use paygate_testkit::fixtures::{TestWallet, FEE};
//!
//! let wallet = TestWallet::new();
//! let coin = wallet.coin(FEE);
//! assert!(coin.is_owned_by(&wallet.requester()));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use paygate_testkit::generators::PaymentAttempt;
//!
//! proptest! {
//!     #[test]
//!     fn ledger_is_monotonic(attempts in prop::collection::vec(any::<PaymentAttempt>(), 1..32)) {
//!         // replay attempts against a ledger
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_wallets, DurableLedger, RefusingSigner, StalledSigner, TestWallet, FEE};
pub use generators::PaymentAttempt;
