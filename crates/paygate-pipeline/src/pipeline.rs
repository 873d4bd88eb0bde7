//! The authorization pipeline.
//!
//! A request is a straight run through [`Stage`]s. Every stage is a method
//! of its own so callers (and tests) can drive or retry one stage at a
//! time. The session credential is owned by the run; every exit path drops
//! it, including a caller dropping the future.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use paygate_core::{ContentId, PaymentInstrument, RequesterId};
use paygate_ledger::{AccessGate, PaymentLedger};
use paygate_session::{RequesterSigner, SessionAuthorizer, SessionCredential};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::collaborators::{ContentFetcher, DecryptError, DecryptionService};
use crate::error::{PipelineError, Result};
use crate::report::FailureReport;
use crate::request::{AccessRequest, EvaluationProof};
use crate::stage::Stage;

/// Timeouts and retry policy.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on stage 1.
    pub fetch_timeout: Duration,
    /// Bound on stage 3, which waits on the requester.
    pub authorize_timeout: Duration,
    /// Bound on each stage 6 attempt.
    pub release_timeout: Duration,
    /// Extra stage 6 attempts after a denial.
    pub release_retries: u32,
    /// Pause before each retry.
    pub release_retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            authorize_timeout: Duration::from_secs(120),
            release_timeout: Duration::from_secs(30),
            release_retries: 2,
            release_retry_delay: Duration::from_millis(500),
        }
    }
}

/// Drives decryption requests from fetch to plaintext.
///
/// Holds no per-request state, so one pipeline serves any number of
/// concurrent requests. The only shared mutable state it touches is the
/// ledger behind the gate.
pub struct AuthorizationPipeline<L, F, D>
where
    L: PaymentLedger,
    F: ContentFetcher + ?Sized,
    D: DecryptionService + ?Sized,
{
    gate: AccessGate<L>,
    authorizer: SessionAuthorizer,
    fetcher: Arc<F>,
    decryptor: Arc<D>,
    config: PipelineConfig,
}

impl<L, F, D> Clone for AuthorizationPipeline<L, F, D>
where
    L: PaymentLedger,
    F: ContentFetcher + ?Sized,
    D: DecryptionService + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            authorizer: self.authorizer.clone(),
            fetcher: Arc::clone(&self.fetcher),
            decryptor: Arc::clone(&self.decryptor),
            config: self.config.clone(),
        }
    }
}

impl<L, F, D> AuthorizationPipeline<L, F, D>
where
    L: PaymentLedger,
    F: ContentFetcher + ?Sized,
    D: DecryptionService + ?Sized,
{
    pub fn new(
        gate: AccessGate<L>,
        authorizer: SessionAuthorizer,
        fetcher: Arc<F>,
        decryptor: Arc<D>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gate,
            authorizer,
            fetcher,
            decryptor,
            config,
        }
    }

    pub fn gate(&self) -> &AccessGate<L> {
        &self.gate
    }

    pub fn authorizer(&self) -> &SessionAuthorizer {
        &self.authorizer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a full request: stages 1 through 7.
    ///
    /// `instrument` is charged the fee only if this run records the first
    /// payment for the pair.
    pub async fn run<S>(
        &self,
        content: &ContentId,
        signer: &S,
        instrument: &mut PaymentInstrument,
    ) -> Result<Bytes>
    where
        S: RequesterSigner + ?Sized,
    {
        let result = self.run_stages(content, signer, instrument).await;
        if let Err(e) = &result {
            warn!(%content, stage = %e.stage(), error = %e, "request failed");
        }
        result
    }

    async fn run_stages<S>(
        &self,
        content: &ContentId,
        signer: &S,
        instrument: &mut PaymentInstrument,
    ) -> Result<Bytes>
    where
        S: RequesterSigner + ?Sized,
    {
        let ciphertext = self.fetch_content(content).await?;
        let mut credential = self.open_session(&signer.requester())?;
        self.authorize_session(&mut credential, signer).await?;
        let mut request = self.assemble_request(content, credential, instrument)?;
        let proof = self.evaluate_access(&mut request).await?;
        let plaintext = self.release_key(&ciphertext, request.credential(), &proof).await?;

        info!(%content, requester = %proof.requester, decision = %proof.decision, "content unlocked");
        Ok(plaintext)
    }

    /// Recover after an interrupted run: stages 2 through 7 with an empty
    /// instrument.
    ///
    /// Succeeds only through the already-paid path and never charges.
    /// Pass the ciphertext from the interrupted run to skip stage 1.
    pub async fn resume<S>(
        &self,
        content: &ContentId,
        signer: &S,
        ciphertext: Option<Bytes>,
    ) -> Result<Bytes>
    where
        S: RequesterSigner + ?Sized,
    {
        let ciphertext = match ciphertext {
            Some(bytes) => bytes,
            None => self.fetch_content(content).await?,
        };
        let requester = signer.requester();
        let mut credential = self.open_session(&requester)?;
        self.authorize_session(&mut credential, signer).await?;

        let mut nothing = PaymentInstrument::empty(requester);
        let mut request = self.assemble_request(content, credential, &mut nothing)?;
        let proof = self.evaluate_access(&mut request).await?;
        let plaintext = self.release_key(&ciphertext, request.credential(), &proof).await?;

        info!(%content, requester = %proof.requester, "content unlocked on resume");
        Ok(plaintext)
    }

    /// Stage 1: fetch the ciphertext.
    pub async fn fetch_content(&self, content: &ContentId) -> Result<Bytes> {
        debug!(%content, stage = %Stage::FetchContent, "stage entered");
        let fetched = timeout(self.config.fetch_timeout, self.fetcher.fetch(content))
            .await
            .map_err(|_| self.timed_out(Stage::FetchContent, self.config.fetch_timeout))?;

        match fetched {
            Ok(bytes) if bytes.is_empty() => Err(PipelineError::ContentUnavailable(format!(
                "{content}: empty blob"
            ))),
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(PipelineError::ContentUnavailable(format!("{content}: {e}"))),
        }
    }

    /// Stage 2: create an unsigned session for `requester`.
    pub fn open_session(&self, requester: &RequesterId) -> Result<SessionCredential> {
        debug!(%requester, stage = %Stage::OpenSession, "stage entered");
        self.authorizer
            .create_default(requester)
            .map_err(PipelineError::SessionCreationFailed)
    }

    /// Stage 3: have the requester sign the session challenge.
    pub async fn authorize_session<S>(
        &self,
        credential: &mut SessionCredential,
        signer: &S,
    ) -> Result<()>
    where
        S: RequesterSigner + ?Sized,
    {
        debug!(requester = %credential.requester(), stage = %Stage::AuthorizeSession, "stage entered");
        if &signer.requester() != credential.requester() {
            return Err(PipelineError::AuthorizationDenied(
                "signer acts for a different requester".into(),
            ));
        }

        let challenge = credential.challenge();
        let signature = timeout(self.config.authorize_timeout, signer.sign_challenge(&challenge))
            .await
            .map_err(|_| self.timed_out(Stage::AuthorizeSession, self.config.authorize_timeout))?
            .map_err(|reason| PipelineError::AuthorizationDenied(reason.to_string()))?;

        credential
            .sign(signature)
            .map_err(|e| PipelineError::AuthorizationDenied(e.to_string()))
    }

    /// Stage 4: bundle content, instrument and signed credential.
    pub fn assemble_request<'a>(
        &self,
        content: &ContentId,
        credential: SessionCredential,
        instrument: &'a mut PaymentInstrument,
    ) -> Result<AccessRequest<'a>> {
        debug!(%content, stage = %Stage::AssembleRequest, "stage entered");
        if !credential.is_signed() {
            return Err(PipelineError::RequestIncomplete(
                "credential not signed".into(),
            ));
        }
        Ok(AccessRequest::new(content.clone(), instrument, credential))
    }

    /// Stage 5: the only ledger interaction, atomic inside the gate.
    pub async fn evaluate_access(&self, request: &mut AccessRequest<'_>) -> Result<EvaluationProof> {
        let (content, requester, instrument) = request.parts_mut();
        debug!(%content, %requester, stage = %Stage::EvaluateAccess, "stage entered");

        let decision = self.gate.evaluate(content, requester, instrument).await?;
        match EvaluationProof::for_decision(content, requester, decision) {
            Some(proof) => Ok(proof),
            None => Err(PipelineError::PaymentInsufficient {
                required: self.gate.fee(),
                offered: instrument.value(),
            }),
        }
    }

    /// Stage 6: ask the decryption service for plaintext.
    ///
    /// The request is signed once with the session key over the proof's
    /// release message. An expired or unsigned credential cannot sign and
    /// is denied here without contacting the service. A denial is retried up to `release_retries` times, since the
    /// committed decision may not have reached the service yet.
    pub async fn release_key(
        &self,
        ciphertext: &Bytes,
        credential: &SessionCredential,
        proof: &EvaluationProof,
    ) -> Result<Bytes> {
        debug!(content = %proof.content, stage = %Stage::ReleaseKey, "stage entered");
        let request_signature = credential
            .sign_request(&proof.release_message())
            .map_err(|e| PipelineError::DecryptionDenied(e.to_string()))?;
        let mut attempt = 0u32;
        loop {
            let released = timeout(
                self.config.release_timeout,
                self.decryptor
                    .decrypt(ciphertext, credential, proof, &request_signature),
            )
            .await
            .map_err(|_| self.timed_out(Stage::ReleaseKey, self.config.release_timeout))?;

            match released {
                Ok(plaintext) => return Ok(plaintext),
                Err(DecryptError::Denied(reason)) if attempt < self.config.release_retries => {
                    attempt += 1;
                    warn!(content = %proof.content, attempt, %reason, "key release denied, retrying");
                    tokio::time::sleep(self.config.release_retry_delay).await;
                }
                Err(DecryptError::Denied(reason)) => {
                    return Err(PipelineError::DecryptionDenied(reason))
                }
                Err(DecryptError::Failed(reason)) => {
                    return Err(PipelineError::DecryptionFailed(reason))
                }
            }
        }
    }

    /// Describe a failure for the requester, re-reading the ledger to tell
    /// whether they have been charged.
    pub async fn report(
        &self,
        error: &PipelineError,
        content: &ContentId,
        requester: &RequesterId,
    ) -> Result<FailureReport> {
        let charged = self.gate.has_payment(content, requester).await?;
        Ok(FailureReport::new(error, charged))
    }

    fn timed_out(&self, stage: Stage, after: Duration) -> PipelineError {
        warn!(%stage, ?after, "stage timed out");
        PipelineError::Timeout { stage, after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;
    use paygate_core::{AccessDecision, Ed25519Signature, Keypair};
    use paygate_ledger::{GateConfig, MemoryLedger};
    use paygate_session::{DeclineReason, KeypairSigner, SessionConfig};

    use crate::collaborators::{BlobStore, FetchError};
    use crate::error::Recoverability;
    use crate::memory::{LocalKeyServer, MemoryBlobStore};

    const FEE: u64 = 5_000_000;

    type Server = LocalKeyServer<MemoryLedger>;

    struct Harness<D: DecryptionService + ?Sized> {
        ledger: Arc<MemoryLedger>,
        store: Arc<MemoryBlobStore>,
        pipeline: AuthorizationPipeline<MemoryLedger, MemoryBlobStore, D>,
    }

    fn build<D, W>(config: PipelineConfig, wrap: W) -> (Harness<D>, Arc<Server>)
    where
        D: DecryptionService,
        W: FnOnce(Arc<Server>) -> D,
    {
        let ledger = Arc::new(MemoryLedger::new());
        let store = Arc::new(MemoryBlobStore::new());
        let server = Arc::new(LocalKeyServer::new(Arc::clone(&ledger)));
        let pipeline = AuthorizationPipeline::new(
            AccessGate::new(Arc::clone(&ledger), GateConfig::default()),
            SessionAuthorizer::new(SessionConfig::default()),
            Arc::clone(&store),
            Arc::new(wrap(Arc::clone(&server))),
            config,
        );
        (
            Harness {
                ledger,
                store,
                pipeline,
            },
            server,
        )
    }

    fn harness() -> (Harness<Arc<Server>>, Arc<Server>) {
        build(PipelineConfig::default(), |server| server)
    }

    async fn publish(store: &MemoryBlobStore, server: &Server, plaintext: &[u8]) -> ContentId {
        let (content, envelope) = server.seal(plaintext).await.unwrap();
        let stored = store.store(envelope).await.unwrap();
        assert_eq!(stored, content);
        content
    }

    struct DecliningSigner(RequesterId);

    #[async_trait]
    impl RequesterSigner for DecliningSigner {
        fn requester(&self) -> RequesterId {
            self.0.clone()
        }

        async fn sign_challenge(&self, _: &[u8]) -> std::result::Result<Ed25519Signature, DeclineReason> {
            Err(DeclineReason::Declined)
        }
    }

    struct SilentSigner(RequesterId);

    #[async_trait]
    impl RequesterSigner for SilentSigner {
        fn requester(&self) -> RequesterId {
            self.0.clone()
        }

        async fn sign_challenge(&self, _: &[u8]) -> std::result::Result<Ed25519Signature, DeclineReason> {
            std::future::pending().await
        }
    }

    struct SlowFetcher;

    #[async_trait]
    impl ContentFetcher for SlowFetcher {
        async fn fetch(&self, _: &ContentId) -> std::result::Result<Bytes, FetchError> {
            std::future::pending().await
        }
    }

    /// Hangs on its first call, then delegates.
    struct StallOnce {
        inner: Arc<Server>,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl DecryptionService for StallOnce {
        async fn decrypt(
            &self,
            ciphertext: &Bytes,
            credential: &SessionCredential,
            proof: &EvaluationProof,
            request_signature: &Ed25519Signature,
        ) -> std::result::Result<Bytes, DecryptError> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner
                .decrypt(ciphertext, credential, proof, request_signature)
                .await
        }
    }

    /// Denies the first `denials` calls as if the payment had not propagated.
    struct Lagging {
        inner: Arc<Server>,
        denials: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DecryptionService for Lagging {
        async fn decrypt(
            &self,
            ciphertext: &Bytes,
            credential: &SessionCredential,
            proof: &EvaluationProof,
            request_signature: &Ed25519Signature,
        ) -> std::result::Result<Bytes, DecryptError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.denials {
                return Err(DecryptError::Denied("payment not yet visible".into()));
            }
            self.inner
                .decrypt(ciphertext, credential, proof, request_signature)
                .await
        }
    }

    #[tokio::test]
    async fn test_pay_once_then_reuse() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let first = h.pipeline.run(&content, &wallet, &mut coin).await.unwrap();
        assert_eq!(&first[..], b"chapter one");
        assert_eq!(coin.value().units(), 0);

        let mut nothing = PaymentInstrument::empty(wallet.requester());
        let again = h.pipeline.run(&content, &wallet, &mut nothing).await.unwrap();
        assert_eq!(again, first);

        assert_eq!(h.ledger.payment_count().await.unwrap(), 1);
        assert_eq!(h.ledger.collected().await.unwrap().units(), FEE);
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_payment_stops_before_release() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), 1_000u64);

        let err = h.pipeline.run(&content, &wallet, &mut coin).await.unwrap_err();

        assert!(matches!(err, PipelineError::PaymentInsufficient { .. }));
        assert_eq!(err.stage(), Stage::EvaluateAccess);
        assert_eq!(coin.value().units(), 1_000);
        assert!(!h.pipeline.gate().has_payment(&content, &wallet.requester()).await.unwrap());

        let report = h.pipeline.report(&err, &content, &wallet.requester()).await.unwrap();
        assert!(!report.charged);
        assert_eq!(report.recoverability, Recoverability::RetryWithFunds);
    }

    #[tokio::test]
    async fn test_missing_content() {
        let (h, _server) = harness();
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let err = h
            .pipeline
            .run(&ContentId::from("blob-404"), &wallet, &mut coin)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ContentUnavailable(_)));
        assert_eq!(coin.value().units(), FEE);
        assert_eq!(h.ledger.payment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_requester_cannot_open_session() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let signer = DecliningSigner(RequesterId::from("not-a-key"));
        let mut coin = PaymentInstrument::new(signer.requester(), FEE);

        let err = h.pipeline.run(&content, &signer, &mut coin).await.unwrap_err();

        assert!(matches!(err, PipelineError::SessionCreationFailed(_)));
        assert_eq!(err.stage(), Stage::OpenSession);
    }

    #[tokio::test]
    async fn test_declined_authorization_discards_session() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let signer = DecliningSigner(Keypair::generate().requester_id());
        let mut coin = PaymentInstrument::new(signer.requester(), FEE);

        let err = h.pipeline.run(&content, &signer, &mut coin).await.unwrap_err();

        assert!(matches!(err, PipelineError::AuthorizationDenied(_)));
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
        assert_eq!(h.ledger.payment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsigned_credential_fails_at_assembly() {
        let (h, _server) = harness();
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);
        let unsigned = h.pipeline.open_session(&wallet.requester()).unwrap();

        let err = h
            .pipeline
            .assemble_request(&ContentId::from("blob-1"), unsigned, &mut coin)
            .err()
            .unwrap();

        assert!(matches!(err, PipelineError::RequestIncomplete(_)));
        assert_eq!(err.stage(), Stage::AssembleRequest);
        assert_eq!(err.recoverability(), Recoverability::RetryFromStart);
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
        assert_eq!(coin.value().units(), FEE);
    }

    #[tokio::test]
    async fn test_release_with_unsigned_session_is_denied() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);
        h.pipeline
            .gate()
            .evaluate(&content, &wallet.requester(), &mut coin)
            .await
            .unwrap();
        let ciphertext = h.pipeline.fetch_content(&content).await.unwrap();
        let proof = EvaluationProof::for_decision(
            &content,
            &wallet.requester(),
            AccessDecision::AlreadyPaid,
        )
        .unwrap();
        let unsigned = h.pipeline.open_session(&wallet.requester()).unwrap();

        let err = h
            .pipeline
            .release_key(&ciphertext, &unsigned, &proof)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::DecryptionDenied(_)));
        assert_eq!(err.stage(), Stage::ReleaseKey);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = AuthorizationPipeline::new(
            AccessGate::new(Arc::clone(&ledger), GateConfig::default()),
            SessionAuthorizer::new(SessionConfig::default()),
            Arc::new(SlowFetcher),
            Arc::new(LocalKeyServer::new(Arc::clone(&ledger))),
            PipelineConfig::default(),
        );
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let err = pipeline
            .run(&ContentId::from("blob-1"), &wallet, &mut coin)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Timeout { stage: Stage::FetchContent, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorize_timeout() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let signer = SilentSigner(Keypair::generate().requester_id());
        let mut coin = PaymentInstrument::new(signer.requester(), FEE);

        let err = h.pipeline.run(&content, &signer, &mut coin).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Timeout { stage: Stage::AuthorizeSession, .. }
        ));
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
        assert_eq!(coin.value().units(), FEE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_release_is_retried() {
        let (h, server) = build(PipelineConfig::default(), |inner| Lagging {
            inner,
            denials: 2,
            calls: AtomicU32::new(0),
        });
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let plaintext = h.pipeline.run(&content, &wallet, &mut coin).await.unwrap();

        assert_eq!(&plaintext[..], b"chapter one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_release_after_retries_keeps_payment() {
        let (h, server) = build(PipelineConfig::default(), |inner| Lagging {
            inner,
            denials: 3,
            calls: AtomicU32::new(0),
        });
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let err = h.pipeline.run(&content, &wallet, &mut coin).await.unwrap_err();

        assert!(matches!(err, PipelineError::DecryptionDenied(_)));
        let report = h.pipeline.report(&err, &content, &wallet.requester()).await.unwrap();
        assert!(report.charged);
        assert_eq!(report.recoverability, Recoverability::RetryAfterDelay);

        // the fourth call goes through
        let plaintext = h.pipeline.resume(&content, &wallet, None).await.unwrap();
        assert_eq!(&plaintext[..], b"chapter one");
        assert_eq!(h.ledger.collected().await.unwrap().units(), FEE);
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_fatal() {
        let (h, server) = harness();
        let (content, envelope) = server.seal(b"chapter one").await.unwrap();
        let mut corrupt = envelope.to_vec();
        corrupt[0] ^= 0xff;
        h.store.insert_raw(content.clone(), Bytes::from(corrupt)).await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let err = h.pipeline.run(&content, &wallet, &mut coin).await.unwrap_err();

        assert!(matches!(err, PipelineError::DecryptionFailed(_)));
        assert_eq!(err.recoverability(), Recoverability::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_after_commit_resumes_without_charge() {
        let (h, server) = build(PipelineConfig::default(), |inner| StallOnce {
            inner,
            stalled: AtomicBool::new(false),
        });
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let mut coin = PaymentInstrument::new(wallet.requester(), FEE);

        let aborted = tokio::time::timeout(
            Duration::from_secs(1),
            h.pipeline.run(&content, &wallet, &mut coin),
        )
        .await;
        assert!(aborted.is_err());
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
        assert!(h.pipeline.gate().has_payment(&content, &wallet.requester()).await.unwrap());
        assert_eq!(coin.value().units(), 0);

        let plaintext = h.pipeline.resume(&content, &wallet, None).await.unwrap();

        assert_eq!(&plaintext[..], b"chapter one");
        assert_eq!(h.ledger.payment_count().await.unwrap(), 1);
        assert_eq!(h.ledger.collected().await.unwrap().units(), FEE);
        assert_eq!(h.pipeline.authorizer().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_resume_without_payment_is_refused() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();

        let err = h.pipeline.resume(&content, &wallet, None).await.unwrap_err();

        assert!(matches!(err, PipelineError::PaymentInsufficient { .. }));
        assert_eq!(h.ledger.payment_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_charge_once() {
        let (h, server) = harness();
        let content = publish(&h.store, &server, b"chapter one").await;
        let wallet = KeypairSigner::generate();
        let pipeline = Arc::new(h.pipeline.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pipeline = Arc::clone(&pipeline);
            let content = content.clone();
            let wallet = wallet.clone();
            handles.push(tokio::spawn(async move {
                let mut coin = PaymentInstrument::new(wallet.requester(), FEE);
                let plaintext = pipeline.run(&content, &wallet, &mut coin).await.unwrap();
                (plaintext, coin.value().units())
            }));
        }

        let mut charged = 0;
        for handle in handles {
            let (plaintext, left) = handle.await.unwrap();
            assert_eq!(&plaintext[..], b"chapter one");
            if left == 0 {
                charged += 1;
            } else {
                assert_eq!(left, FEE);
            }
        }
        assert_eq!(charged, 1);
        assert_eq!(h.ledger.collected().await.unwrap().units(), FEE);
        assert_eq!(pipeline.authorizer().active_sessions(), 0);
    }
}
