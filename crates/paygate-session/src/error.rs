//! Error types for the session module.

use thiserror::Error;

/// Errors that can occur while creating or using a session credential.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requester does not resolve to an authorizable principal.
    #[error("cannot resolve requester: {0}")]
    Unresolvable(#[from] paygate_core::CoreError),

    /// TTL outside the allowed window.
    #[error("ttl {ttl_minutes}m outside 1..={max_minutes}m")]
    InvalidTtl { ttl_minutes: u32, max_minutes: u32 },

    /// The requester's signature does not cover this credential's challenge.
    #[error("requester signature rejected")]
    SignatureRejected,

    /// The credential already carries a requester signature.
    #[error("credential already signed")]
    AlreadySigned,

    /// The credential has not been signed by the requester yet.
    #[error("credential not signed")]
    NotSigned,

    /// The credential's validity window has closed.
    #[error("credential expired at {expired_at}")]
    Expired { expired_at: i64 },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
