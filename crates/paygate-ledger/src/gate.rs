//! The access gate: check-and-record evaluation over a payment ledger.
//!
//! `evaluate` confirms a prior payment or validates and records a new one.
//! The only step that mutates shared state is
//! [`PaymentLedger::record_payment`], which is atomic per pair, so the
//! check and the record are never separately observable: a caller that
//! loses a first-payment race is told `AlreadyPaid` and keeps its funds.

use std::sync::Arc;

use paygate_core::{AccessDecision, Amount, ContentId, CoreError, PaymentInstrument, RequesterId};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::traits::{PaymentLedger, RecordOutcome};

/// Default fee in the smallest unit.
pub const DEFAULT_FEE: Amount = Amount(5_000_000);

/// Configuration for the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Fixed fee charged once per (content, requester).
    pub fee: Amount,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { fee: DEFAULT_FEE }
    }
}

/// Errors that abort an evaluation without a decision.
#[derive(Debug, Error)]
pub enum GateError {
    /// The instrument belongs to someone other than the requester.
    #[error("instrument owned by {owner} presented by {requester}")]
    InstrumentNotOwned { owner: String, requester: String },

    /// The ledger could not be read or written.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The fee could not be split off the instrument.
    #[error("instrument error: {0}")]
    Instrument(#[from] CoreError),
}

/// Check-and-record gate in front of a shared ledger.
pub struct AccessGate<L: PaymentLedger> {
    ledger: Arc<L>,
    config: GateConfig,
}

impl<L: PaymentLedger> Clone for AccessGate<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            config: self.config,
        }
    }
}

impl<L: PaymentLedger> AccessGate<L> {
    /// Create a gate over `ledger`.
    pub fn new(ledger: Arc<L>, config: GateConfig) -> Self {
        Self { ledger, config }
    }

    /// The fixed fee.
    pub fn fee(&self) -> Amount {
        self.config.fee
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Read-only payment check. Never mutates.
    pub async fn has_payment(
        &self,
        content: &ContentId,
        requester: &RequesterId,
    ) -> Result<bool, GateError> {
        Ok(self.ledger.has_payment(content, requester).await?)
    }

    /// Evaluate one access request.
    ///
    /// 1. Paid before: `AlreadyPaid`, the instrument is not inspected.
    /// 2. Instrument below the fee: `PaymentInsufficient`, nothing changes.
    /// 3. Otherwise withdraw the fee and record atomically. The fee is
    ///    returned to `instrument` unless this call committed the record.
    ///
    /// Cancel-safe: if the future is dropped while the record is in flight,
    /// the instrument stays debited, matching the record that may commit.
    pub async fn evaluate(
        &self,
        content: &ContentId,
        requester: &RequesterId,
        instrument: &mut PaymentInstrument,
    ) -> Result<AccessDecision, GateError> {
        if self.ledger.has_payment(content, requester).await? {
            debug!(%content, %requester, "already paid, fast path");
            return Ok(AccessDecision::AlreadyPaid);
        }

        if !instrument.is_owned_by(requester) {
            return Err(GateError::InstrumentNotOwned {
                owner: instrument.owner().to_string(),
                requester: requester.to_string(),
            });
        }

        let fee = self.config.fee;
        if instrument.value() < fee {
            debug!(%content, %requester, offered = %instrument.value(), %fee, "payment insufficient");
            return Ok(AccessDecision::PaymentInsufficient {
                required: fee,
                offered: instrument.value(),
            });
        }

        // Debit first: a record handed to the ledger commits even if this
        // future is dropped.
        let escrow = instrument.withdraw(fee)?;
        match self.ledger.record_payment(content, requester, fee).await {
            Ok(RecordOutcome::Recorded) => {
                info!(%content, %requester, %fee, "payment recorded");
                Ok(AccessDecision::PaymentAccepted)
            }
            Ok(RecordOutcome::AlreadyPaid) => {
                instrument.deposit(escrow)?;
                debug!(%content, %requester, "lost first-payment race, already paid");
                Ok(AccessDecision::AlreadyPaid)
            }
            Err(e) => {
                instrument.deposit(escrow)?;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::sqlite::SqliteLedger;

    fn gate() -> AccessGate<MemoryLedger> {
        AccessGate::new(Arc::new(MemoryLedger::new()), GateConfig::default())
    }

    fn coin(owner: &RequesterId, units: u64) -> PaymentInstrument {
        PaymentInstrument::new(owner.clone(), units)
    }

    #[tokio::test]
    async fn test_exact_fee_is_accepted() {
        let gate = gate();
        let requester = RequesterId::from("alice");
        let content = ContentId::from("blob-1");
        let mut instrument = coin(&requester, 5_000_000);

        let decision = gate.evaluate(&content, &requester, &mut instrument).await.unwrap();

        assert_eq!(decision, AccessDecision::PaymentAccepted);
        assert!(gate.has_payment(&content, &requester).await.unwrap());
        assert_eq!(instrument.value(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_leaves_ledger_untouched() {
        let gate = gate();
        let requester = RequesterId::from("alice");
        let content = ContentId::from("blob-1");
        let mut instrument = coin(&requester, 1_000);

        let decision = gate.evaluate(&content, &requester, &mut instrument).await.unwrap();

        assert_eq!(
            decision,
            AccessDecision::PaymentInsufficient {
                required: DEFAULT_FEE,
                offered: Amount(1_000)
            }
        );
        assert!(!gate.has_payment(&content, &requester).await.unwrap());
        assert_eq!(instrument.value(), Amount(1_000));
        assert_eq!(gate.ledger().payment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_paid_requester_needs_no_funds() {
        let gate = gate();
        let requester = RequesterId::from("alice");
        let content = ContentId::from("blob-1");

        let mut full = coin(&requester, 5_000_000);
        gate.evaluate(&content, &requester, &mut full).await.unwrap();

        let mut empty = PaymentInstrument::empty(requester.clone());
        let first = gate.evaluate(&content, &requester, &mut empty).await.unwrap();
        let second = gate.evaluate(&content, &requester, &mut empty).await.unwrap();

        assert_eq!(first, AccessDecision::AlreadyPaid);
        assert_eq!(second, AccessDecision::AlreadyPaid);
        assert_eq!(gate.ledger().payment_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_change_is_returned_to_owner() {
        let gate = gate();
        let requester = RequesterId::from("alice");
        let mut instrument = coin(&requester, 8_000_000);

        gate.evaluate(&ContentId::from("blob-1"), &requester, &mut instrument)
            .await
            .unwrap();

        assert_eq!(instrument.value(), Amount(3_000_000));
        assert_eq!(gate.ledger().collected().await.unwrap(), DEFAULT_FEE);
    }

    #[tokio::test]
    async fn test_foreign_instrument_is_rejected() {
        let gate = gate();
        let alice = RequesterId::from("alice");
        let bob = RequesterId::from("bob");
        let content = ContentId::from("blob-1");
        let mut bobs_coin = coin(&bob, 5_000_000);

        let err = gate.evaluate(&content, &alice, &mut bobs_coin).await.unwrap_err();

        assert!(matches!(err, GateError::InstrumentNotOwned { .. }));
        assert!(!gate.has_payment(&content, &alice).await.unwrap());
        assert_eq!(bobs_coin.value(), Amount(5_000_000));
    }

    #[tokio::test]
    async fn test_two_requesters_pay_separately() {
        let gate = gate();
        let content = ContentId::from("blob-1");
        let alice = RequesterId::from("alice");
        let bob = RequesterId::from("bob");

        gate.evaluate(&content, &alice, &mut coin(&alice, 5_000_000))
            .await
            .unwrap();
        assert!(gate.has_payment(&content, &alice).await.unwrap());
        assert!(!gate.has_payment(&content, &bob).await.unwrap());

        gate.evaluate(&content, &bob, &mut coin(&bob, 5_000_000))
            .await
            .unwrap();
        assert!(gate.has_payment(&content, &bob).await.unwrap());
        assert_eq!(gate.ledger().payment_count().await.unwrap(), 2);
    }

    async fn race<L: PaymentLedger + 'static>(gate: AccessGate<L>, contenders: usize) {
        let content = ContentId::from("blob-1");
        let requester = RequesterId::from("alice");

        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let gate = gate.clone();
                let content = content.clone();
                let requester = requester.clone();
                tokio::spawn(async move {
                    let mut instrument = PaymentInstrument::new(requester.clone(), 5_000_000u64);
                    let decision = gate
                        .evaluate(&content, &requester, &mut instrument)
                        .await
                        .unwrap();
                    (decision, instrument.value())
                })
            })
            .collect();

        let mut accepted = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                (AccessDecision::PaymentAccepted, left) => {
                    assert_eq!(left, Amount::ZERO);
                    accepted += 1;
                }
                (AccessDecision::AlreadyPaid, left) => {
                    assert_eq!(left, Amount(5_000_000));
                    already += 1;
                }
                (other, _) => panic!("unexpected decision {other:?}"),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(already, contenders - 1);
        assert_eq!(gate.ledger().payment_count().await.unwrap(), 1);
        assert_eq!(gate.ledger().collected().await.unwrap(), DEFAULT_FEE);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_payments_memory() {
        race(gate(), 24).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_payments_sqlite() {
        let ledger = Arc::new(SqliteLedger::open_memory().unwrap());
        race(AccessGate::new(ledger, GateConfig::default()), 12).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_record_still_charges_instrument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
        let gate = AccessGate::new(Arc::clone(&ledger), GateConfig::default());
        let content = ContentId::from("blob-1");
        let requester = RequesterId::from("alice");
        let mut instrument = coin(&requester, 5_000_000);

        // Hold the write lock so the record stalls before it can commit.
        let blocker = rusqlite::Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            gate.evaluate(&content, &requester, &mut instrument),
        )
        .await;
        assert!(cancelled.is_err());

        blocker.execute_batch("COMMIT").unwrap();

        // The detached record commits once the lock is released.
        let mut paid = false;
        for _ in 0..100 {
            if ledger.has_payment(&content, &requester).await.unwrap() {
                paid = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(paid);
        assert_eq!(instrument.value(), Amount::ZERO);
        assert_eq!(ledger.collected().await.unwrap(), DEFAULT_FEE);
    }

    #[tokio::test]
    async fn test_failed_record_refunds_instrument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let gate = AccessGate::new(
            Arc::new(SqliteLedger::open(&path).unwrap()),
            GateConfig::default(),
        );
        let requester = RequesterId::from("alice");
        let mut instrument = coin(&requester, 5_000_000);

        let saboteur = rusqlite::Connection::open(&path).unwrap();
        saboteur.execute_batch("DROP TABLE treasury").unwrap();

        let err = gate
            .evaluate(&ContentId::from("blob-1"), &requester, &mut instrument)
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Ledger(_)));
        assert_eq!(instrument.value(), Amount(5_000_000));
        assert!(!gate.has_payment(&ContentId::from("blob-1"), &requester).await.unwrap());
    }
}
