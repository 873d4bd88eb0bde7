//! Payment value types and the access decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::types::RequesterId;

/// A quantity of fungible value in the smallest unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    /// Zero value.
    pub const ZERO: Self = Self(0);

    /// Raw unit count.
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Subtract, returning `None` on underflow.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Add, saturating at `u64::MAX`.
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

/// A fungible value bundle a requester presents as payment.
///
/// The gate inspects [`value`](Self::value) and withdraws the fee only when
/// a new payment is committed. Anything left over stays with the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInstrument {
    owner: RequesterId,
    value: Amount,
}

impl PaymentInstrument {
    /// Create an instrument owned by `owner` holding `value`.
    pub fn new(owner: RequesterId, value: impl Into<Amount>) -> Self {
        Self {
            owner,
            value: value.into(),
        }
    }

    /// A zero-value instrument, valid only for already-paid content.
    pub fn empty(owner: RequesterId) -> Self {
        Self::new(owner, Amount::ZERO)
    }

    /// Who owns the funds.
    pub fn owner(&self) -> &RequesterId {
        &self.owner
    }

    /// Current value.
    pub fn value(&self) -> Amount {
        self.value
    }

    /// Whether `requester` may spend this instrument.
    pub fn is_owned_by(&self, requester: &RequesterId) -> bool {
        &self.owner == requester
    }

    /// Split `amount` off this instrument.
    ///
    /// The returned instrument carries the withdrawn value; `self` keeps the
    /// change. Fails without modification if the value is too small.
    pub fn withdraw(&mut self, amount: Amount) -> Result<PaymentInstrument> {
        let remaining = self
            .value
            .checked_sub(amount)
            .ok_or(CoreError::InsufficientValue {
                requested: amount.0,
                available: self.value.0,
            })?;
        self.value = remaining;
        Ok(PaymentInstrument {
            owner: self.owner.clone(),
            value: amount,
        })
    }

    /// Merge `funds` back into this instrument. Both must share an owner.
    pub fn deposit(&mut self, funds: PaymentInstrument) -> Result<()> {
        if funds.owner != self.owner {
            return Err(CoreError::OwnerMismatch {
                owner: self.owner.to_string(),
                funds: funds.owner.to_string(),
            });
        }
        self.value = self.value.saturating_add(funds.value);
        Ok(())
    }
}

/// Outcome of evaluating one access request against the payment ledger.
///
/// Not persisted; drives whether key release proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessDecision {
    /// The requester paid for this content before. No funds were touched.
    AlreadyPaid,
    /// A new payment was validated and recorded by this evaluation.
    PaymentAccepted,
    /// The instrument was below the fee. Nothing was recorded.
    PaymentInsufficient {
        /// The fixed fee.
        required: Amount,
        /// What the instrument held.
        offered: Amount,
    },
}

impl AccessDecision {
    /// Whether key release may proceed.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            AccessDecision::AlreadyPaid | AccessDecision::PaymentAccepted
        )
    }

    /// Whether this evaluation moved funds.
    pub fn charged(&self) -> bool {
        matches!(self, AccessDecision::PaymentAccepted)
    }

    /// Stable tag used in signed statements.
    pub fn tag(&self) -> u8 {
        match self {
            AccessDecision::AlreadyPaid => 1,
            AccessDecision::PaymentAccepted => 2,
            AccessDecision::PaymentInsufficient { .. } => 3,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::AlreadyPaid => write!(f, "already paid"),
            AccessDecision::PaymentAccepted => write!(f, "payment accepted"),
            AccessDecision::PaymentInsufficient { required, offered } => {
                write!(f, "payment insufficient ({} < {})", offered, required)
            }
        }
    }
}
