//! Error types for paygate core.

use thiserror::Error;

/// Core errors raised by identity, crypto and payment primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("requester {0} is not an authorizable principal")]
    UnresolvablePrincipal(String),

    #[error("instrument holds {available}, cannot withdraw {requested}")]
    InsufficientValue { requested: u64, available: u64 },

    #[error("funds owned by {funds} cannot join an instrument owned by {owner}")]
    OwnerMismatch { owner: String, funds: String },

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
