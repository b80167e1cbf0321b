//! Reversals: rollback, reversewin and rollbackrollback
//!
//! None of these consult the session. Each one writes its own record under a
//! derived key and moves the record it reverses to `rolled_back` in the same
//! commit.

use super::{RecordContext, Rejection, TransactionEngine};
use crate::models::{Account, OperationKind, TransactionRecord, TransactionStatus};
use crate::protocol::request::{RequestKind, ReverseWinRequest, RollbackRequest, RollbackRollbackRequest};
use crate::protocol::response::{Outcome, ReversalResponse};
use crate::protocol::ProtocolCode;
use crate::store::{CommitOutcome, LedgerCommit};
use tracing::{debug, info};

impl TransactionEngine {
    /// Return a wager's stake to the player
    pub async fn rollback(&self, request: &RollbackRequest) -> ReversalResponse {
        let outcome = self.try_rollback(request).await;
        self.respond(
            RequestKind::Rollback,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_rollback(&self, request: &RollbackRequest) -> Result<ReversalResponse, Rejection> {
        let ctx = &request.context;
        let account = self.known_account(&ctx.account_id).await?;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::Rollback.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::Rollback, &account)? {
            return self.replay_reversal(&account, &existing, &ctx.api_version);
        }

        let original = self
            .store
            .get(&OperationKind::Wager.idempotency_key(&request.transaction_id))?
            .ok_or_else(|| {
                Rejection::business(
                    ProtocolCode::WagerNotFound,
                    format!("no wager {}", request.transaction_id),
                )
                .for_account(&account)
            })?;

        if original.account_id != account.account_id {
            return Err(not_allowed(&account, "wager belongs to another account"));
        }
        if !original.kind.is_rollback_eligible() {
            return Err(not_allowed(&account, format!("{:?} cannot be rolled back", original.kind)));
        }
        if original.status == TransactionStatus::RolledBack {
            return Err(Rejection::business(ProtocolCode::TransactionExists, "wager already rolled back")
                .for_account(&account));
        }
        let result_key = OperationKind::Result.idempotency_key(&request.transaction_id);
        if self.store.get(&result_key)?.is_some() {
            return Err(not_allowed(&account, "wager already settled by a result"));
        }

        let amount = request.rollback_amount.unwrap_or(original.amount);
        if amount > original.amount {
            return Err(not_allowed(
                &account,
                format!("rollback {} exceeds bet {}", amount, original.amount),
            ));
        }
        Self::check_precision(&account, &[amount])?;

        let round_id = request.round_id.as_deref().unwrap_or(&original.round_id);
        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id,
            game_id: &request.game_id,
        };
        let record = Self::new_record(
            &record_ctx,
            OperationKind::Rollback,
            &request.transaction_id,
            amount,
            amount,
        );

        let commit = LedgerCommit::new(&account.user_id, amount)
            .insert(record.clone())
            .update_status(original.key.clone(), TransactionStatus::RolledBack);
        self.finish_reversal(&account, commit, &record, &ctx.api_version, "Wager rolled back")
    }

    /// Take back a credited result
    pub async fn reverse_win(&self, request: &ReverseWinRequest) -> ReversalResponse {
        let outcome = self.try_reverse_win(request).await;
        self.respond(
            RequestKind::ReverseWin,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_reverse_win(&self, request: &ReverseWinRequest) -> Result<ReversalResponse, Rejection> {
        let ctx = &request.context;
        let account = self.known_account(&ctx.account_id).await?;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::RollbackOnResult.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::RollbackOnResult, &account)? {
            return self.replay_reversal(&account, &existing, &ctx.api_version);
        }

        let win_transaction = request
            .win_transaction_id
            .as_deref()
            .unwrap_or(&request.transaction_id);
        let original = self
            .store
            .get(&OperationKind::Result.idempotency_key(win_transaction))?
            .ok_or_else(|| {
                Rejection::business(ProtocolCode::WagerNotFound, format!("no result {}", win_transaction))
                    .for_account(&account)
            })?;

        if original.account_id != account.account_id {
            return Err(not_allowed(&account, "result belongs to another account"));
        }
        if original.status == TransactionStatus::RolledBack {
            return Err(Rejection::business(ProtocolCode::TransactionExists, "result already reversed")
                .for_account(&account));
        }
        if request.amount > original.amount {
            return Err(not_allowed(
                &account,
                format!("reversal {} exceeds win {}", request.amount, original.amount),
            ));
        }
        Self::check_precision(&account, &[request.amount])?;

        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id: &request.round_id,
            game_id: &request.game_id,
        };
        let record = Self::new_record(
            &record_ctx,
            OperationKind::RollbackOnResult,
            &request.transaction_id,
            request.amount,
            -request.amount,
        );

        let commit = LedgerCommit::new(&account.user_id, -request.amount)
            .insert(record.clone())
            .update_status(original.key.clone(), TransactionStatus::RolledBack);
        self.finish_reversal(&account, commit, &record, &ctx.api_version, "Win reversed")
    }

    /// Undo a rollback, taking the returned stake again
    pub async fn rollback_rollback(&self, request: &RollbackRollbackRequest) -> ReversalResponse {
        let outcome = self.try_rollback_rollback(request).await;
        self.respond(
            RequestKind::RollbackRollback,
            &request.transaction_id,
            &request.context.api_version,
            outcome,
        )
    }

    async fn try_rollback_rollback(&self, request: &RollbackRollbackRequest) -> Result<ReversalResponse, Rejection> {
        let ctx = &request.context;
        let account = self.known_account(&ctx.account_id).await?;

        let _guard = self.lock_account(&account.user_id).await;

        let key = OperationKind::RollbackOnRollback.idempotency_key(&request.transaction_id);
        if let Some(existing) = self.stored(&key, OperationKind::RollbackOnRollback, &account)? {
            return self.replay_reversal(&account, &existing, &ctx.api_version);
        }

        let original = self
            .store
            .get(&OperationKind::Rollback.idempotency_key(&request.transaction_id))?
            .ok_or_else(|| {
                Rejection::business(
                    ProtocolCode::WagerNotFound,
                    format!("no rollback {}", request.transaction_id),
                )
                .for_account(&account)
            })?;

        if original.account_id != account.account_id {
            return Err(not_allowed(&account, "rollback belongs to another account"));
        }
        if original.status == TransactionStatus::RolledBack {
            return Err(Rejection::business(ProtocolCode::TransactionExists, "rollback already reversed")
                .for_account(&account));
        }

        let amount = request.rollback_amount.unwrap_or(original.amount);
        if amount > original.amount {
            return Err(not_allowed(
                &account,
                format!("amount {} exceeds rollback {}", amount, original.amount),
            ));
        }
        Self::check_precision(&account, &[amount])?;

        let record_ctx = RecordContext {
            account: &account,
            session_id: &ctx.session_id,
            round_id: &request.round_id,
            game_id: &request.game_id,
        };
        let record = Self::new_record(
            &record_ctx,
            OperationKind::RollbackOnRollback,
            &request.transaction_id,
            amount,
            -amount,
        );

        let commit = LedgerCommit::new(&account.user_id, -amount)
            .insert(record.clone())
            .update_status(original.key.clone(), TransactionStatus::RolledBack);
        self.finish_reversal(&account, commit, &record, &ctx.api_version, "Rollback reversed")
    }

    fn finish_reversal(
        &self,
        account: &Account,
        commit: LedgerCommit,
        record: &TransactionRecord,
        api_version: &str,
        message: &'static str,
    ) -> Result<ReversalResponse, Rejection> {
        match self.commit(account, commit)? {
            CommitOutcome::Applied { balance } => {
                info!(
                    transaction_id = %record.transaction_id,
                    account_id = %account.account_id,
                    amount = %record.amount,
                    balance = %balance,
                    "{}",
                    message
                );
                Ok(ReversalResponse::new(
                    Outcome::success(),
                    &record.wallet_transaction_id,
                    self.balances(account, balance, api_version),
                ))
            }
            CommitOutcome::Duplicate(existing) => self.replay_reversal(account, &existing, api_version),
        }
    }

    fn replay_reversal(
        &self,
        account: &Account,
        existing: &TransactionRecord,
        api_version: &str,
    ) -> Result<ReversalResponse, Rejection> {
        debug!(transaction_id = %existing.transaction_id, kind = ?existing.kind, "Duplicate reversal");
        Ok(ReversalResponse::new(
            Outcome::duplicate(),
            &existing.wallet_transaction_id,
            self.current_balances(account, api_version)?,
        ))
    }
}

fn not_allowed(account: &Account, reason: impl Into<String>) -> Rejection {
    Rejection::business(ProtocolCode::OperationNotAllowed, reason).for_account(account)
}
