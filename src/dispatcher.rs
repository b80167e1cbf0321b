//! Request dispatcher
//!
//! Maps one provider call to one engine operation. The discriminator is
//! resolved first so the signature can be checked with the operation's
//! include-request-key flag; protocol errors leave the ledger untouched.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::engine::TransactionEngine;
use crate::metrics::ProtocolMetrics;
use crate::protocol::request::{Operation, ProviderParams, RequestKind, SignaturePolicy};
use crate::protocol::response::ProviderResponse;
use crate::protocol::ProtocolError;
use crate::signature::SignatureCodec;

/// Dispatcher settings taken from configuration at startup
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub verify_signatures: bool,
    pub max_batch_bets: usize,
    pub default_api_version: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            verify_signatures: true,
            max_batch_bets: 500,
            default_api_version: "1.2".to_string(),
        }
    }
}

pub struct RequestDispatcher {
    engine: Arc<TransactionEngine>,
    codec: SignatureCodec,
    policy: SignaturePolicy,
    settings: DispatchSettings,
    metrics: ProtocolMetrics,
}

impl RequestDispatcher {
    pub fn new(
        engine: Arc<TransactionEngine>,
        codec: SignatureCodec,
        policy: SignaturePolicy,
        settings: DispatchSettings,
        metrics: ProtocolMetrics,
    ) -> Self {
        Self {
            engine,
            codec,
            policy,
            settings,
            metrics,
        }
    }

    pub fn engine(&self) -> &Arc<TransactionEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &ProtocolMetrics {
        &self.metrics
    }

    /// Handle one provider call
    pub async fn dispatch(
        &self,
        params: &ProviderParams,
        signature: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<ProviderResponse, ProtocolError> {
        let started = Instant::now();
        let kind = params.discriminator()?;

        let outcome = self.handle(kind, params, signature, body).await;
        let code = match &outcome {
            Ok(response) => response.code(),
            Err(err) => err.code(),
        };
        self.metrics.record_request(kind.as_str(), code, started.elapsed());
        outcome
    }

    async fn handle(
        &self,
        kind: RequestKind,
        params: &ProviderParams,
        signature: Option<&str>,
        body: Option<&[u8]>,
    ) -> Result<ProviderResponse, ProtocolError> {
        if self.settings.verify_signatures {
            self.check_signature(kind, params, signature)?;
        }

        let operation = Operation::parse(
            kind,
            params,
            body,
            &self.settings.default_api_version,
            self.settings.max_batch_bets,
        )
        .inspect_err(|err| debug!(request = kind.as_str(), error = %err, "Malformed request"))?;

        Ok(self.execute(operation).await)
    }

    fn check_signature(
        &self,
        kind: RequestKind,
        params: &ProviderParams,
        signature: Option<&str>,
    ) -> Result<(), ProtocolError> {
        let Some(signature) = signature else {
            self.metrics.record_signature_failure();
            warn!(request = kind.as_str(), "Missing signature header");
            return Err(ProtocolError::MissingSignature);
        };

        let include_request_key = self.policy.includes_request_key(kind);
        if !self.codec.verify(signature, params.iter(), include_request_key) {
            self.metrics.record_signature_failure();
            warn!(request = kind.as_str(), "Signature mismatch");
            return Err(ProtocolError::InvalidSignature);
        }
        Ok(())
    }

    async fn execute(&self, operation: Operation) -> ProviderResponse {
        let engine = &self.engine;
        match operation {
            Operation::GetAccount(request) => ProviderResponse::Account(engine.get_account(&request).await),
            Operation::GetBalance(request) => ProviderResponse::Balance(engine.get_balance(&request).await),
            Operation::Wager(request) => ProviderResponse::Wager(engine.wager(&request).await),
            Operation::Result(request) => ProviderResponse::Result(engine.result(&request).await),
            Operation::WagerAndResult(request) => {
                ProviderResponse::WagerAndResult(engine.wager_and_result(&request).await)
            }
            Operation::Rollback(request) => ProviderResponse::Reversal(engine.rollback(&request).await),
            Operation::Jackpot(request) => ProviderResponse::Result(engine.jackpot(&request).await),
            Operation::ReverseWin(request) => ProviderResponse::Reversal(engine.reverse_win(&request).await),
            Operation::RollbackRollback(request) => {
                ProviderResponse::Reversal(engine.rollback_rollback(&request).await)
            }
            Operation::WagerByBatch(request) => ProviderResponse::Batch(engine.wager_by_batch(&request).await),
        }
    }
}
