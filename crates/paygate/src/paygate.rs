//! The bootstrap object tying ledger, gate, sessions and pipeline together.

use std::sync::Arc;

use bytes::Bytes;
use paygate_core::{AccessDecision, Amount, ContentId, PaymentInstrument, RequesterId};
use paygate_ledger::{AccessGate, PaymentLedger, SqliteLedger};
use paygate_pipeline::{
    AuthorizationPipeline, BlobStore, FailureReport, LocalKeyServer, MemoryBlobStore,
    PipelineError,
};
use paygate_session::{RequesterSigner, SessionAuthorizer};
use tracing::info;

use crate::config::PaygateConfig;
use crate::error::{PaygateError, Result};

type Pipeline<L> = AuthorizationPipeline<L, MemoryBlobStore, LocalKeyServer<L>>;

/// One paygate deployment.
///
/// The ledger is opened once here and shared by the gate, the key server
/// and every pipeline run for the life of the process.
pub struct Paygate<L: PaymentLedger = SqliteLedger> {
    config: PaygateConfig,
    ledger: Arc<L>,
    blobs: Arc<MemoryBlobStore>,
    key_server: Arc<LocalKeyServer<L>>,
    pipeline: Pipeline<L>,
}

impl Paygate<SqliteLedger> {
    /// Validate `config`, open the SQLite ledger it names (in-memory when
    /// no path is set) and wire everything up.
    pub fn bootstrap(config: PaygateConfig) -> Result<Self> {
        config.validate()?;
        let ledger = match &config.ledger.path {
            Some(path) => SqliteLedger::open(path)?,
            None => SqliteLedger::open_memory()?,
        };
        Self::with_ledger(ledger, config)
    }
}

impl<L: PaymentLedger> Paygate<L> {
    /// Wire a deployment over an already-open ledger.
    pub fn with_ledger(ledger: L, config: PaygateConfig) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(ledger);
        let blobs = Arc::new(MemoryBlobStore::new());
        let key_server = Arc::new(LocalKeyServer::new(Arc::clone(&ledger)));
        let pipeline = AuthorizationPipeline::new(
            AccessGate::new(Arc::clone(&ledger), config.gate_config()),
            SessionAuthorizer::new(config.session_config()),
            Arc::clone(&blobs),
            Arc::clone(&key_server),
            config.pipeline_config(),
        );

        info!(
            fee = config.fee,
            ttl_minutes = config.session.ttl_minutes,
            key_servers = ?config.key_servers,
            "paygate ready"
        );
        Ok(Self {
            config,
            ledger,
            blobs,
            key_server,
            pipeline,
        })
    }

    pub fn config(&self) -> &PaygateConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn blobs(&self) -> &Arc<MemoryBlobStore> {
        &self.blobs
    }

    pub fn pipeline(&self) -> &Pipeline<L> {
        &self.pipeline
    }

    /// Seal and store new content, returning its identifier.
    pub async fn publish(&self, plaintext: &[u8]) -> Result<ContentId> {
        let (content, envelope) = self
            .key_server
            .seal(plaintext)
            .await
            .map_err(|e| PaygateError::Publish(e.to_string()))?;
        let stored = self
            .blobs
            .store(envelope)
            .await
            .map_err(|e| PaygateError::Publish(e.to_string()))?;
        if stored != content {
            return Err(PaygateError::Publish(format!(
                "store addressed content as {stored}, expected {content}"
            )));
        }
        info!(%content, "content published");
        Ok(content)
    }

    /// Read-only payment check.
    pub async fn has_payment(&self, content: &ContentId, requester: &RequesterId) -> Result<bool> {
        Ok(self.ledger.has_payment(content, requester).await?)
    }

    /// Run the access gate alone, without sessions or key release.
    pub async fn evaluate(
        &self,
        content: &ContentId,
        requester: &RequesterId,
        instrument: &mut PaymentInstrument,
    ) -> Result<AccessDecision> {
        Ok(self
            .pipeline
            .gate()
            .evaluate(content, requester, instrument)
            .await?)
    }

    /// Decrypt `content` for the signer, paying from `instrument` if needed.
    pub async fn unlock<S>(
        &self,
        content: &ContentId,
        signer: &S,
        instrument: &mut PaymentInstrument,
    ) -> std::result::Result<Bytes, PipelineError>
    where
        S: RequesterSigner + ?Sized,
    {
        self.pipeline.run(content, signer, instrument).await
    }

    /// Retry key release after an interrupted unlock. Never charges.
    pub async fn resume<S>(
        &self,
        content: &ContentId,
        signer: &S,
    ) -> std::result::Result<Bytes, PipelineError>
    where
        S: RequesterSigner + ?Sized,
    {
        self.pipeline.resume(content, signer, None).await
    }

    /// Summarize a failed unlock for the requester.
    pub async fn report(
        &self,
        error: &PipelineError,
        content: &ContentId,
        requester: &RequesterId,
    ) -> Result<FailureReport> {
        Ok(self.pipeline.report(error, content, requester).await?)
    }

    /// Requesters who have paid for `content`.
    pub async fn payers_of(&self, content: &ContentId) -> Result<Vec<RequesterId>> {
        Ok(self.ledger.payers_of(content).await?)
    }

    /// Total fees retained.
    pub async fn collected(&self) -> Result<Amount> {
        Ok(self.ledger.collected().await?)
    }

    /// Session credentials currently alive.
    pub fn active_sessions(&self) -> usize {
        self.pipeline.authorizer().active_sessions()
    }
}
