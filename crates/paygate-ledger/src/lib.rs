//! # Paygate Ledger
//!
//! The durable payment ledger and the access gate that mutates it.
//!
//! ## Overview
//!
//! The ledger maps `(ContentId, RequesterId)` to a permanent "paid" flag.
//! It sits behind the [`PaymentLedger`] trait so the gate and the key
//! servers are storage-agnostic. The primary implementation is
//! [`SqliteLedger`]; [`MemoryLedger`] has identical semantics for tests
//! and single-process deployments.
//!
//! ## Key Types
//!
//! - [`PaymentLedger`] - The async trait for ledger operations
//! - [`SqliteLedger`] - SQLite-backed durable ledger
//! - [`MemoryLedger`] - In-memory ledger
//! - [`AccessGate`] - Check-and-record evaluation over a ledger
//! - [`RecordOutcome`] - Result of an atomic record attempt
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paygate_core::{ContentId, Keypair, PaymentInstrument};
//! use paygate_ledger::{AccessGate, GateConfig, SqliteLedger};
//!
//! async fn example() {
//!     let ledger = Arc::new(SqliteLedger::open("payments.db").unwrap());
//!     let gate = AccessGate::new(ledger, GateConfig::default());
//!
//!     let wallet = Keypair::generate();
//!     let mut coin = PaymentInstrument::new(wallet.requester_id(), 5_000_000u64);
//!     let decision = gate
//!         .evaluate(&ContentId::from("blob-1"), &wallet.requester_id(), &mut coin)
//!         .await
//!         .unwrap();
//!     assert!(decision.grants_access());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Flat composite key**: one entry per `(content, requester)`; there is
//!   no inner table to create lazily, so first payers cannot race on it.
//! - **Atomic insert-if-absent**: `record_payment` inserts and credits the
//!   treasury in one unit, and reports `AlreadyPaid` to the loser of a race.
//! - **Monotonic**: there is no delete. A paid flag is never unset.
//! - **Boolean only**: no per-record amount or timestamp is kept.

pub mod error;
pub mod gate;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{LedgerError, Result};
pub use gate::{AccessGate, GateConfig, GateError};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{PaymentLedger, RecordOutcome};
