//! Ledger trait: the abstract interface for payment persistence.
//!
//! This trait keeps the gate and key servers storage-agnostic.
//! Implementations include SQLite (primary) and in-memory.

use async_trait::async_trait;
use paygate_core::{Amount, ContentId, RequesterId};

use crate::error::Result;

/// Result of an atomic record attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// This call transitioned the pair from unpaid to paid.
    Recorded,
    /// The pair was already paid; nothing changed.
    AlreadyPaid,
}

/// The PaymentLedger trait: async interface over the shared payment map.
///
/// # Design Notes
///
/// - **Read-only check**: `has_payment` never mutates and is safe to call
///   from any service at any time.
/// - **Idempotent record**: `record_payment` on a paid pair is a no-op that
///   returns `AlreadyPaid`.
/// - **Atomicity**: the presence check, the insert and the treasury credit
///   inside `record_payment` are one unit. Concurrent callers for the same
///   pair see exactly one `Recorded`.
/// - **Independence**: writes for different pairs never observe each other.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Whether `requester` has paid for `content`.
    async fn has_payment(&self, content: &ContentId, requester: &RequesterId) -> Result<bool>;

    /// Record a payment of `fee` for the pair if it is not yet paid.
    async fn record_payment(
        &self,
        content: &ContentId,
        requester: &RequesterId,
        fee: Amount,
    ) -> Result<RecordOutcome>;

    /// Total number of paid pairs.
    async fn payment_count(&self) -> Result<u64>;

    /// Every requester that has paid for `content`, in byte order.
    async fn payers_of(&self, content: &ContentId) -> Result<Vec<RequesterId>>;

    /// Aggregate of all fees retained by committed payments.
    async fn collected(&self) -> Result<Amount>;
}
