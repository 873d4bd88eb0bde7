//! Error types for the ledger module.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A lock guarding ledger state was poisoned by a panicking writer.
    #[error("ledger lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking ledger task could not be joined.
    #[error("ledger task failed: {0}")]
    Task(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
