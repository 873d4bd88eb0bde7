//! # Paygate Pipeline
//!
//! Orchestrates one decryption request end to end:
//!
//! ```text
//! 1 fetch ──> 2 open session ──> 3 authorize ──> 4 assemble request
//!        ──> 5 evaluate (ledger) ──> 6 release key ──> 7 deliver
//! ```
//!
//! Each stage is an async method on [`AuthorizationPipeline`] with a typed
//! failure. Only stage 5 touches the ledger, and only through the gate's
//! atomic record. Stages 1, 3 and 6 are bounded by timeouts.
//!
//! ## Collaborators
//!
//! Fetching blobs and releasing keys are external services, described by
//! [`ContentFetcher`], [`BlobStore`] and [`DecryptionService`]. The
//! [`memory`] module provides in-process versions: a content-addressed blob
//! store and a key server that seals content in ChaCha20-Poly1305 envelopes
//! and releases it only against a signed session and a visible payment.
//!
//! ## Failures
//!
//! Every [`PipelineError`] names the [`Stage`] it came from and a
//! [`Recoverability`] class. [`FailureReport`] adds whether the requester
//! has been charged, by re-reading the ledger.

pub mod collaborators;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod stage;

pub use collaborators::{BlobStore, ContentFetcher, DecryptError, DecryptionService, FetchError};
pub use envelope::SealedContent;
pub use error::{EnvelopeError, PipelineError, Recoverability, Result};
pub use memory::{LocalKeyServer, MemoryBlobStore};
pub use pipeline::{AuthorizationPipeline, PipelineConfig};
pub use report::FailureReport;
pub use request::{AccessRequest, EvaluationProof};
pub use stage::Stage;
