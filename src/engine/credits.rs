//! Crediting operations: result and jackpot

use super::{RecordContext, Rejection, TransactionEngine};
use crate::models::{Account, GameStatus, OperationKind, TransactionRecord, TransactionStatus};
use crate::protocol::request::{JackpotRequest, RequestKind, ResultRequest};
use crate::protocol::response::{JackpotResponse, Outcome, ResultResponse};
use crate::protocol::ProtocolCode;
use crate::store::{CommitOutcome, LedgerCommit};
use tracing::{debug, info, warn};

impl TransactionEngine {
    /// Settle a round. Expired sessions do not block results.
    pub async fn result(&self, request: &ResultRequest) -> ResultResponse {
        let outcome = self.try_result(request).await;
        self.respond(
            RequestKind::Result,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_result(&self, request: &ResultRequest) -> Result<ResultResponse, Rejection> {
        let ctx = &request.context;
        let account = self.known_account(&ctx.account_id).await?;

        if let Err(err) = self.sessions.validate(&ctx.session_id).await {
            warn!(
                transaction_id = %request.transaction_id,
                session_id = %ctx.session_id,
                error = %err,
                "Processing result on unusable session"
            );
        }

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::Result.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::Result, &account)? {
            return self.replay_credit(&account, &existing, &ctx.api_version);
        }

        Self::check_precision(&account, &[request.result_amount])?;

        if let Some(wager) = self.store.get(&OperationKind::Wager.idempotency_key(&request.transaction_id))? {
            if wager.account_id != account.account_id {
                return Err(Rejection::business(
                    ProtocolCode::OperationNotAllowed,
                    "wager belongs to another account",
                )
                .for_account(&account));
            }
            if !wager.kind.is_stake() {
                return Err(Rejection::business(
                    ProtocolCode::OperationNotAllowed,
                    format!("{:?} {} takes no result", wager.kind, request.transaction_id),
                )
                .for_account(&account));
            }
            if wager.status == TransactionStatus::RolledBack {
                return Err(Rejection::business(ProtocolCode::OperationNotAllowed, "wager already rolled back")
                    .for_account(&account));
            }
        } else {
            debug!(transaction_id = %request.transaction_id, "Result without a recorded wager");
        }

        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id: &request.round_id,
            game_id: &request.game_id,
        };
        let record = TransactionRecord {
            status: match request.game_status {
                GameStatus::Pending => TransactionStatus::Pending,
                GameStatus::Completed => TransactionStatus::Completed,
            },
            frb_id: request.frb_id.clone(),
            ..Self::new_record(
                &record_ctx,
                OperationKind::Result,
                &request.transaction_id,
                request.result_amount,
                request.result_amount,
            )
        };

        // A zero result is stored for idempotency without touching the balance
        let commit = LedgerCommit::new(&account.user_id, record.delta).insert(record.clone());
        match self.commit(&account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    transaction_id = %request.transaction_id,
                    account_id = %account.account_id,
                    win = %request.result_amount,
                    balance = %balance,
                    "Result applied"
                );
                Ok(ResultResponse::new(
                    Outcome::success(),
                    &record.wallet_transaction_id,
                    request.result_amount,
                    self.balances(&account, balance, &ctx.api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => self.replay_credit(&account, &existing, &ctx.api_version),
        }
    }

    /// Credit a jackpot win unrelated to any wager
    pub async fn jackpot(&self, request: &JackpotRequest) -> JackpotResponse {
        let outcome = self.try_jackpot(request).await;
        self.respond(
            RequestKind::Jackpot,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_jackpot(&self, request: &JackpotRequest) -> Result<JackpotResponse, Rejection> {
        let ctx = &request.context;
        let account = self.known_account(&ctx.account_id).await?;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::Jackpot.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::Jackpot, &account)? {
            return self.replay_credit(&account, &existing, &ctx.api_version);
        }

        Self::check_precision(&account, &[request.amount])?;

        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id: &request.round_id,
            game_id: &request.game_id,
        };
        let record = TransactionRecord {
            frb_id: request.frb_id.clone(),
            ..Self::new_record(
                &record_ctx,
                OperationKind::Jackpot,
                &request.transaction_id,
                request.amount,
                request.amount,
            )
        };

        let commit = LedgerCommit::new(&account.user_id, record.delta).insert(record.clone());
        match self.commit(&account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    transaction_id = %request.transaction_id,
                    account_id = %account.account_id,
                    amount = %request.amount,
                    balance = %balance,
                    "🎰 Jackpot credited"
                );
                Ok(JackpotResponse::new(
                    Outcome::success(),
                    &record.wallet_transaction_id,
                    request.amount,
                    self.balances(&account, balance, &ctx.api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => self.replay_credit(&account, &existing, &ctx.api_version),
        }
    }

    fn replay_credit(
        &self,
        account: &Account,
        existing: &TransactionRecord,
        api_version: &str,
    ) -> Result<ResultResponse, Rejection> {
        debug!(transaction_id = %existing.transaction_id, kind = ?existing.kind, "Duplicate credit");
        Ok(ResultResponse::new(
            Outcome::duplicate(),
            &existing.wallet_transaction_id,
            existing.amount,
            self.current_balances(account, api_version)?,
        ))
    }
}
