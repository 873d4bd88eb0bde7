//! Error types for the pipeline module.

use std::time::Duration;

use paygate_core::Amount;
use paygate_ledger::{GateError, LedgerError};
use paygate_session::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::Stage;

/// How a caller may recover from a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recoverability {
    /// Nothing changed; retry with a larger instrument.
    RetryWithFunds,
    /// No ledger mutation happened; run the whole request again.
    RetryFromStart,
    /// The decision may not have propagated yet; retry key release shortly.
    RetryAfterDelay,
    /// The content cannot be recovered with these inputs.
    Fatal,
}

impl Recoverability {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Recoverability::Fatal)
    }
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The instrument is below the fee and the pair was not paid before.
    #[error("payment insufficient: required {required}, offered {offered}")]
    PaymentInsufficient { required: Amount, offered: Amount },

    /// The instrument cannot be used by this requester.
    #[error("instrument rejected: {0}")]
    InstrumentRejected(String),

    /// The ciphertext could not be fetched, or was empty.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// A time-bounded stage did not finish in time.
    #[error("stage {stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    /// No session could be created for the requester.
    #[error("session creation failed: {0}")]
    SessionCreationFailed(#[source] SessionError),

    /// The requester did not authorize the session.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The request could not be assembled from the session.
    #[error("request incomplete: {0}")]
    RequestIncomplete(String),

    /// The key server refused to release the key.
    #[error("decryption denied: {0}")]
    DecryptionDenied(String),

    /// The key was released but decryption failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The ledger could not be read or written during evaluation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::PaymentInsufficient { .. }
            | PipelineError::InstrumentRejected(_)
            | PipelineError::Ledger(_) => Stage::EvaluateAccess,
            PipelineError::ContentUnavailable(_) => Stage::FetchContent,
            PipelineError::Timeout { stage, .. } => *stage,
            PipelineError::SessionCreationFailed(_) => Stage::OpenSession,
            PipelineError::AuthorizationDenied(_) => Stage::AuthorizeSession,
            PipelineError::RequestIncomplete(_) => Stage::AssembleRequest,
            PipelineError::DecryptionDenied(_) | PipelineError::DecryptionFailed(_) => {
                Stage::ReleaseKey
            }
        }
    }

    pub fn recoverability(&self) -> Recoverability {
        match self {
            PipelineError::PaymentInsufficient { .. } | PipelineError::InstrumentRejected(_) => {
                Recoverability::RetryWithFunds
            }
            PipelineError::ContentUnavailable(_)
            | PipelineError::Timeout { .. }
            | PipelineError::SessionCreationFailed(_)
            | PipelineError::AuthorizationDenied(_)
            | PipelineError::RequestIncomplete(_)
            | PipelineError::Ledger(_) => Recoverability::RetryFromStart,
            PipelineError::DecryptionDenied(_) => Recoverability::RetryAfterDelay,
            PipelineError::DecryptionFailed(_) => Recoverability::Fatal,
        }
    }

    /// Whether the caller must pay (more) before retrying.
    pub fn requires_payment(&self) -> bool {
        self.recoverability() == Recoverability::RetryWithFunds
    }
}

impl From<GateError> for PipelineError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Ledger(e) => PipelineError::Ledger(e),
            other => PipelineError::InstrumentRejected(other.to_string()),
        }
    }
}

/// Errors from sealing or opening content envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("malformed envelope: {0}")]
    Encoding(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
