//! Proptest generators for property-based testing.

use proptest::prelude::*;

use paygate_core::{Amount, ContentId, Keypair, RequesterId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a requester backed by a real Ed25519 key.
pub fn requester_id() -> impl Strategy<Value = RequesterId> {
    keypair().prop_map(|kp| kp.requester_id())
}

/// Generate a non-empty opaque content identifier.
pub fn content_id() -> impl Strategy<Value = ContentId> {
    prop::collection::vec(any::<u8>(), 1..=64).prop_map(ContentId::from)
}

/// Generate an amount around the fee: well below, at, or above it.
pub fn amount_near(fee: u64) -> impl Strategy<Value = Amount> {
    prop_oneof![
        (0..fee).prop_map(Amount),
        Just(Amount(fee)),
        (fee..=fee.saturating_mul(4)).prop_map(Amount),
    ]
}

/// One payment attempt drawn from small pools of contents and requesters,
/// so that repeats and collisions are common.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    /// Index into a pool of content ids.
    pub content: usize,
    /// Index into a pool of requesters.
    pub requester: usize,
    /// Instrument value presented.
    pub offered: u64,
}

/// Pool sizes used by `PaymentAttempt`.
pub const CONTENT_POOL: usize = 4;
pub const REQUESTER_POOL: usize = 3;

impl Arbitrary for PaymentAttempt {
    type Parameters = u64;
    type Strategy = BoxedStrategy<Self>;

    /// `fee` defaults to 0 through `any()`, in which case the default fee
    /// is used.
    fn arbitrary_with(fee: Self::Parameters) -> Self::Strategy {
        let fee = if fee == 0 { 5_000_000 } else { fee };
        (0..CONTENT_POOL, 0..REQUESTER_POOL, amount_near(fee))
            .prop_map(|(content, requester, offered)| PaymentAttempt {
                content,
                requester,
                offered: offered.units(),
            })
            .boxed()
    }
}
