//! Debiting operations: wager, wagerAndResult and batch wagers

use super::{RecordContext, Rejection, TransactionEngine};
use crate::currency;
use crate::models::{Account, GameStatus, OperationKind, TransactionRecord, TransactionStatus};
use crate::protocol::request::{BatchWagerRequest, RequestKind, WagerAndResultRequest, WagerRequest};
use crate::protocol::response::{
    BatchBetResult, BatchWagerResponse, Outcome, WagerAndResultResponse, WagerResponse,
};
use crate::protocol::ProtocolCode;
use crate::store::{CommitOutcome, LedgerCommit};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

impl TransactionEngine {
    /// Debit a bet; replays return the stored wager with the current balance
    pub async fn wager(&self, request: &WagerRequest) -> WagerResponse {
        let outcome = self.try_wager(request).await;
        self.respond(
            RequestKind::Wager,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_wager(&self, request: &WagerRequest) -> Result<WagerResponse, Rejection> {
        let ctx = &request.context;
        let account = self.session_account(&ctx.account_id, &ctx.session_id).await?;
        let session_check = self.check_session(&ctx.session_id, &account).await;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::Wager.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::Wager, &account)? {
            return self.replay_wager(&account, &existing, &ctx.api_version);
        }

        session_check?;
        Self::ensure_active(&account)?;
        Self::check_precision(&account, &[request.bet_amount])?;

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
                OperationKind::Wager,
                &request.transaction_id,
                request.bet_amount,
                -request.bet_amount,
            )
        };

        let commit = LedgerCommit::new(&account.user_id, record.delta).insert(record.clone());
        match self.commit(&account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    transaction_id = %request.transaction_id,
                    account_id = %account.account_id,
                    bet = %request.bet_amount,
                    balance = %balance,
                    "Wager accepted"
                );
                Ok(WagerResponse::new(
                    Outcome::success(),
                    &record.wallet_transaction_id,
                    request.bet_amount,
                    self.balances(&account, balance, &ctx.api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => self.replay_wager(&account, &existing, &ctx.api_version),
        }
    }

    fn replay_wager(
        &self,
        account: &Account,
        existing: &TransactionRecord,
        api_version: &str,
    ) -> Result<WagerResponse, Rejection> {
        debug!(transaction_id = %existing.transaction_id, "Duplicate wager");
        Ok(WagerResponse::new(
            Outcome::duplicate(),
            &existing.wallet_transaction_id,
            existing.amount,
            self.current_balances(account, api_version)?,
        ))
    }

    /// Bet and win in one call, applied as a single net delta
    pub async fn wager_and_result(&self, request: &WagerAndResultRequest) -> WagerAndResultResponse {
        let outcome = self.try_wager_and_result(request).await;
        self.respond(
            RequestKind::WagerAndResult,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_wager_and_result(
        &self,
        request: &WagerAndResultRequest,
    ) -> Result<WagerAndResultResponse, Rejection> {
        let ctx = &request.context;
        let account = self.session_account(&ctx.account_id, &ctx.session_id).await?;
        let session_check = self.check_session(&ctx.session_id, &account).await;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::WagerAndResult.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::WagerAndResult, &account)? {
            debug!(transaction_id = %request.transaction_id, "Duplicate wagerAndResult");
            return Ok(WagerAndResultResponse::new(
                Outcome::duplicate(),
                &existing.wallet_transaction_id,
                existing.amount,
                existing.win_amount.unwrap_or(Decimal::ZERO),
                self.current_balances(&account, &ctx.api_version)?,
            ));
        }

        session_check?;
        Self::ensure_active(&account)?;
        Self::check_precision(&account, &[request.bet_amount, request.win_amount])?;

        let balance = self.store.balance(&account.user_id)?;
        if balance < request.bet_amount {
            return Err(Rejection::business(
                ProtocolCode::OutOfMoney,
                format!("balance {} below bet {}", balance, request.bet_amount),
            )
            .for_account(&account));
        }

        let net = request.win_amount - request.bet_amount;
        let status = match request.game_status {
            Some(GameStatus::Pending) => TransactionStatus::Pending,
            _ => TransactionStatus::Completed,
        };
        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id: &request.round_id,
            game_id: &request.game_id,
        };
        let record = TransactionRecord {
            win_amount: Some(request.win_amount),
            status,
            frb_id: request.frb_id.clone(),
            ..Self::new_record(
                &record_ctx,
                OperationKind::WagerAndResult,
                &request.transaction_id,
                request.bet_amount,
                net,
            )
        };

        let commit = LedgerCommit::new(&account.user_id, net).insert(record.clone());
        match self.commit(&account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    transaction_id = %request.transaction_id,
                    account_id = %account.account_id,
                    bet = %request.bet_amount,
                    win = %request.win_amount,
                    balance = %balance,
                    "WagerAndResult applied"
                );
                Ok(WagerAndResultResponse::new(
                    Outcome::success(),
                    &record.wallet_transaction_id,
                    request.bet_amount,
                    request.win_amount,
                    self.balances(&account, balance, &ctx.api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => Ok(WagerAndResultResponse::new(
                Outcome::duplicate(),
                &existing.wallet_transaction_id,
                existing.amount,
                existing.win_amount.unwrap_or(Decimal::ZERO),
                self.current_balances(&account, &ctx.api_version)?,
            )),
        }
    }

    /// Many bets debited in one commit; already-seen bets answer from the store
    pub async fn wager_by_batch(&self, request: &BatchWagerRequest) -> BatchWagerResponse {
        let first_transaction = request
            .bets
            .first()
            .map(|bet| bet.transaction_id.as_str())
            .unwrap_or_default();
        let outcome = self.try_wager_by_batch(request).await;
        self.respond(RequestKind::WagerByBatch, first_transaction, &request.api_version, outcome)
    }

    async fn try_wager_by_batch(&self, request: &BatchWagerRequest) -> Result<BatchWagerResponse, Rejection> {
        let account = self
            .session_account(&request.account_id, &request.game_session_id)
            .await?;
        let session_check = self.check_session(&request.game_session_id, &account).await;

        let _guard = self.lock_account(&account.user_id).await;
        let scale = currency::scale_for(&account.currency);

        // Resolve each bet against the store and against earlier bets in this batch
        let mut results: Vec<Option<BatchBetResult>> = Vec::with_capacity(request.bets.len());
        let mut fresh: Vec<TransactionRecord> = Vec::new();
        let mut fresh_index: HashMap<String, usize> = HashMap::new();
        let mut replayed = 0usize;

        for bet in &request.bets {
            if fresh_index.contains_key(&bet.transaction_id) {
                results.push(None);
                continue;
            }
            let key = OperationKind::BatchItem.idempotency_key(&bet.transaction_id);
            match self.stored(&key, OperationKind::BatchItem, &account)? {
                Some(existing) => {
                    replayed += 1;
                    results.push(Some(Self::batch_result(&existing, scale)));
                }
                None => {
                    let record_ctx = RecordContext {
                        account: &account,
                        session_id: &request.game_session_id,
                        round_id: &bet.round_id,
                        game_id: &request.game_id,
                    };
                    let record = TransactionRecord {
                        frb_id: bet.frb_id.clone(),
                        ..Self::new_record(
                            &record_ctx,
                            OperationKind::BatchItem,
                            &bet.transaction_id,
                            bet.amount,
                            -bet.amount,
                        )
                    };
                    fresh_index.insert(bet.transaction_id.clone(), fresh.len());
                    fresh.push(record);
                    results.push(None);
                }
            }
        }

        let fill = |results: Vec<Option<BatchBetResult>>, fresh: &[TransactionRecord]| -> Vec<BatchBetResult> {
            request
                .bets
                .iter()
                .zip(results)
                .filter_map(|(bet, result)| {
                    result.or_else(|| {
                        fresh_index
                            .get(&bet.transaction_id)
                            .map(|index| Self::batch_result(&fresh[*index], scale))
                    })
                })
                .collect()
        };

        if fresh.is_empty() {
            debug!(account_id = %account.account_id, bets = replayed, "Duplicate batch");
            let balances = self.current_balances(&account, &request.api_version)?;
            return Ok(BatchWagerResponse::new(
                Outcome::duplicate(),
                "OK",
                fill(results, &fresh),
                balances,
            ));
        }

        session_check?;
        Self::ensure_active(&account)?;
        let amounts: Vec<Decimal> = fresh.iter().map(|record| record.amount).collect();
        Self::check_precision(&account, &amounts)?;

        let total: Decimal = amounts.iter().copied().sum();
        let mut commit = LedgerCommit::new(&account.user_id, -total);
        commit.inserts = fresh.clone();

        match self.commit(&account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    account_id = %account.account_id,
                    new_bets = fresh.len(),
                    replayed_bets = replayed,
                    total = %total,
                    balance = %balance,
                    "Batch wager accepted"
                );
                Ok(BatchWagerResponse::new(
                    Outcome::success(),
                    "OK",
                    fill(results, &fresh),
                    self.balances(&account, balance, &request.api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => Err(Rejection::business(
                ProtocolCode::TransactionExists,
                format!("bet {} was recorded concurrently", existing.transaction_id),
            )
            .for_account(&account)),
        }
    }

    fn batch_result(record: &TransactionRecord, scale: u32) -> BatchBetResult {
        BatchBetResult {
            provider_transaction_id: record.transaction_id.clone(),
            transaction_id: record.wallet_transaction_id.clone(),
            bonus_money_bet: currency::at_scale(Decimal::ZERO, scale),
            real_money_bet: currency::at_scale(record.amount, scale),
        }
    }
}
