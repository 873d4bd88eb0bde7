//! Access-evaluation requests and the proofs they yield.

use paygate_core::{
    AccessDecision, Blake3Hash, ContentId, PaymentInstrument, RequesterId, Statement,
};
use paygate_session::SessionCredential;
use serde::{Deserialize, Serialize};

const PROOF_CONTEXT: &str = "paygate evaluation-proof v1";
const RELEASE_DOMAIN: &str = "paygate key-release";

/// Stage 4 output: everything the gate needs, bundled for one evaluation.
///
/// The request owns the signed credential, so the credential is discarded
/// when the request is.
#[derive(Debug)]
pub struct AccessRequest<'a> {
    content: ContentId,
    instrument: &'a mut PaymentInstrument,
    credential: SessionCredential,
}

impl<'a> AccessRequest<'a> {
    pub(crate) fn new(
        content: ContentId,
        instrument: &'a mut PaymentInstrument,
        credential: SessionCredential,
    ) -> Self {
        Self {
            content,
            instrument,
            credential,
        }
    }

    pub fn content(&self) -> &ContentId {
        &self.content
    }

    pub fn requester(&self) -> &RequesterId {
        self.credential.requester()
    }

    pub fn instrument(&self) -> &PaymentInstrument {
        &*self.instrument
    }

    pub fn credential(&self) -> &SessionCredential {
        &self.credential
    }

    pub(crate) fn parts_mut(&mut self) -> (&ContentId, &RequesterId, &mut PaymentInstrument) {
        (&self.content, self.credential.requester(), &mut *self.instrument)
    }
}

/// The gate's decision for a pair, as carried to the key server.
///
/// The digest is an unkeyed checksum over the content, the requester and
/// the decision. It catches corruption in transit, not forgery: anyone can
/// build an intact proof. Key servers must confirm the payment in the
/// ledger themselves before releasing a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationProof {
    pub content: ContentId,
    pub requester: RequesterId,
    pub decision: AccessDecision,
    pub digest: Blake3Hash,
}

impl EvaluationProof {
    /// Build a proof for a granting decision. `None` if access was refused.
    pub fn for_decision(
        content: &ContentId,
        requester: &RequesterId,
        decision: AccessDecision,
    ) -> Option<Self> {
        if !decision.grants_access() {
            return None;
        }
        Some(Self {
            content: content.clone(),
            requester: requester.clone(),
            decision,
            digest: Self::compute_digest(content, requester, decision),
        })
    }

    fn compute_digest(
        content: &ContentId,
        requester: &RequesterId,
        decision: AccessDecision,
    ) -> Blake3Hash {
        Blake3Hash::derive(
            PROOF_CONTEXT,
            &[content.as_bytes(), requester.as_bytes(), &[decision.tag()]],
        )
    }

    /// Whether the checksum still matches the fields.
    pub fn is_intact(&self) -> bool {
        self.decision.grants_access()
            && self.digest == Self::compute_digest(&self.content, &self.requester, self.decision)
    }

    /// The canonical bytes a session key signs to ask for key release.
    pub fn release_message(&self) -> Vec<u8> {
        Statement::new()
            .text(0, RELEASE_DOMAIN)
            .bytes(1, self.content.as_bytes())
            .bytes(2, self.requester.as_bytes())
            .uint(3, u64::from(self.decision.tag()))
            .bytes(4, self.digest.as_bytes())
            .encode()
    }
}
