//! In-memory implementation of the PaymentLedger trait.
//!
//! Same semantics as SQLite but nothing survives the process. Thread-safe
//! via RwLock; `record_payment` runs entirely under one write guard.

use std::collections::{BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use paygate_core::{Amount, ContentId, RequesterId};

use crate::error::{LedgerError, Result};
use crate::traits::{PaymentLedger, RecordOutcome};

/// In-memory ledger implementation.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    /// Paid pairs, keyed by the flat composite key.
    payments: HashSet<(ContentId, RequesterId)>,

    /// Fees retained so far.
    collected: Amount,
}

impl MemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner {
                payments: HashSet::new(),
                collected: Amount::ZERO,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.inner
            .read()
            .map_err(|e| LedgerError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.inner
            .write()
            .map_err(|e| LedgerError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    async fn has_payment(&self, content: &ContentId, requester: &RequesterId) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .payments
            .contains(&(content.clone(), requester.clone())))
    }

    async fn record_payment(
        &self,
        content: &ContentId,
        requester: &RequesterId,
        fee: Amount,
    ) -> Result<RecordOutcome> {
        let mut inner = self.write()?;

        if !inner.payments.insert((content.clone(), requester.clone())) {
            return Ok(RecordOutcome::AlreadyPaid);
        }
        inner.collected = inner.collected.saturating_add(fee);

        Ok(RecordOutcome::Recorded)
    }

    async fn payment_count(&self) -> Result<u64> {
        Ok(self.read()?.payments.len() as u64)
    }

    async fn payers_of(&self, content: &ContentId) -> Result<Vec<RequesterId>> {
        let inner = self.read()?;
        let payers: BTreeSet<RequesterId> = inner
            .payments
            .iter()
            .filter(|(cid, _)| cid == content)
            .map(|(_, requester)| requester.clone())
            .collect();
        Ok(payers.into_iter().collect())
    }

    async fn collected(&self) -> Result<Amount> {
        Ok(self.read()?.collected)
    }
}
