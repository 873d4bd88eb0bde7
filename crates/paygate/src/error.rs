//! Error types for the facade.

use paygate_ledger::{GateError, LedgerError};
use paygate_pipeline::PipelineError;
use thiserror::Error;

/// Errors from bootstrapping and operating a [`crate::Paygate`].
#[derive(Debug, Error)]
pub enum PaygateError {
    /// Configuration could not be read, parsed or accepted.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    /// A decryption request failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Content could not be sealed or stored.
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, PaygateError>;
