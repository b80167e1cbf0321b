//! Transaction engine
//!
//! The protocol state machine. Each operation resolves the account, takes the
//! account's lock, answers replays from the stored record, applies business
//! rules and finally commits the record together with its balance effect.
//!
//! Directory and session lookups happen before the lock is taken; only store
//! round trips run while it is held. Business rejections never escape as
//! errors: every public operation returns a well-formed response.

mod credits;
mod lookups;
mod reversals;
mod wagers;

use crate::currency;
use crate::directory::{AccountDirectory, SessionError, SessionOracle};
use crate::errors::{DirectoryError, WalletError};
use crate::models::{Account, OperationKind, Session, TransactionRecord, TransactionStatus};
use crate::protocol::request::RequestKind;
use crate::protocol::response::{ProtocolResponse, WalletBalances};
use crate::protocol::ProtocolCode;
use crate::store::{CommitOutcome, LedgerCommit, WalletStore};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, warn};
use uuid::Uuid;

/// Engine settings taken from configuration at startup
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Echoed when a request carries no API version
    pub default_api_version: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_api_version: "1.2".to_string(),
        }
    }
}

/// Provider transaction state machine
pub struct TransactionEngine {
    store: Arc<dyn WalletStore>,
    sessions: Arc<dyn SessionOracle>,
    accounts: Arc<dyn AccountDirectory>,
    account_locks: DashMap<String, Arc<Mutex<()>>>,
    settings: EngineSettings,
}

/// Why an operation did not apply
#[derive(Debug)]
pub(crate) struct Rejection {
    code: ProtocolCode,
    reason: String,
    account: Option<Account>,
    source: Option<WalletError>,
}

impl Rejection {
    pub(crate) fn business(code: ProtocolCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            account: None,
            source: None,
        }
    }

    pub(crate) fn technical(err: WalletError) -> Self {
        Self {
            code: ProtocolCode::TechnicalError,
            reason: err.to_string(),
            account: None,
            source: Some(err),
        }
    }

    /// Attach the account so the rejection can report its balance
    pub(crate) fn for_account(mut self, account: &Account) -> Self {
        self.account = Some(account.clone());
        self
    }
}

impl From<WalletError> for Rejection {
    fn from(err: WalletError) -> Self {
        Rejection::technical(err)
    }
}

/// Holds one user's lock; the map entry goes away with the last holder
struct AccountGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    user_id: String,
    _held: OwnedMutexGuard<()>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        // Two references left means the map and this guard: nobody is waiting
        self.locks
            .remove_if(&self.user_id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

/// Identifiers shared by every record an operation writes
pub(crate) struct RecordContext<'a> {
    pub account: &'a Account,
    pub session_id: &'a str,
    pub round_id: &'a str,
    pub game_id: &'a str,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<dyn WalletStore>,
        sessions: Arc<dyn SessionOracle>,
        accounts: Arc<dyn AccountDirectory>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            sessions,
            accounts,
            account_locks: DashMap::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn WalletStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Serialises all ledger work for one user
    async fn lock_account(&self, user_id: &str) -> AccountGuard<'_> {
        let lock = self
            .account_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        AccountGuard {
            locks: &self.account_locks,
            user_id: user_id.to_string(),
            _held: lock.lock_owned().await,
        }
    }

    async fn validate_session(&self, session_id: &str) -> Result<Session, Rejection> {
        self.sessions.validate(session_id).await.map_err(|err| match err {
            SessionError::Unavailable(reason) => {
                Rejection::technical(WalletError::Directory(DirectoryError::Unavailable(reason)))
            }
            invalid => Rejection::business(ProtocolCode::NotLoggedOn, invalid.to_string()),
        })
    }

    /// Session must be valid and belong to the account's user
    async fn check_session(&self, session_id: &str, account: &Account) -> Result<(), Rejection> {
        let session = self
            .validate_session(session_id)
            .await
            .map_err(|rejection| rejection.for_account(account))?;
        if session.user_id != account.user_id {
            return Err(
                Rejection::business(ProtocolCode::OperationNotAllowed, "session belongs to another user")
                    .for_account(account),
            );
        }
        Ok(())
    }

    /// Account for session-bound operations, created on first contact
    async fn session_account(&self, account_id: &str, session_id: &str) -> Result<Account, Rejection> {
        if let Some(account) = self.accounts.get_by_account_id(account_id).await? {
            return Ok(account);
        }
        let session = self.validate_session(session_id).await?;
        let account = self.accounts.get_or_create(&session.user_id).await?;
        if account.account_id != account_id {
            return Err(Rejection::business(
                ProtocolCode::OperationNotAllowed,
                format!("account {} does not belong to session", account_id),
            ));
        }
        Ok(account)
    }

    /// Account that must already exist
    async fn known_account(&self, account_id: &str) -> Result<Account, Rejection> {
        self.accounts.get_by_account_id(account_id).await?.ok_or_else(|| {
            Rejection::business(ProtocolCode::OperationNotAllowed, format!("unknown account {}", account_id))
        })
    }

    fn ensure_active(account: &Account) -> Result<(), Rejection> {
        if !account.is_active() {
            return Err(Rejection::business(ProtocolCode::OperationNotAllowed, "account suspended").for_account(account));
        }
        Ok(())
    }

    fn check_precision(account: &Account, amounts: &[Decimal]) -> Result<(), Rejection> {
        let scale = currency::scale_for(&account.currency);
        if let Some(amount) = amounts.iter().find(|amount| !currency::fits_scale(**amount, scale)) {
            return Err(Rejection::business(
                ProtocolCode::OperationNotAllowed,
                format!("{} exceeds {} precision", amount, account.currency),
            )
            .for_account(account));
        }
        Ok(())
    }

    /// Stored record for `key`, refusing records of another kind or account
    fn stored(&self, key: &str, kind: OperationKind, account: &Account) -> Result<Option<TransactionRecord>, Rejection> {
        match self.store.get(key)? {
            Some(record) if record.kind != kind || record.account_id != account.account_id => Err(
                Rejection::business(
                    ProtocolCode::TransactionExists,
                    format!("transaction {} already used by another operation", record.transaction_id),
                )
                .for_account(account),
            ),
            other => Ok(other),
        }
    }

    fn commit(&self, account: &Account, commit: LedgerCommit) -> Result<CommitOutcome, Rejection> {
        self.store.commit(commit).map_err(|err| {
            if err.is_insufficient_funds() {
                Rejection::business(ProtocolCode::OutOfMoney, err.to_string()).for_account(account)
            } else {
                Rejection::technical(err)
            }
        })
    }

    fn new_record(
        ctx: &RecordContext<'_>,
        kind: OperationKind,
        transaction_id: &str,
        amount: Decimal,
        delta: Decimal,
    ) -> TransactionRecord {
        TransactionRecord {
            key: kind.idempotency_key(transaction_id),
            transaction_id: transaction_id.to_string(),
            wallet_transaction_id: Uuid::new_v4().to_string(),
            user_id: ctx.account.user_id.clone(),
            account_id: ctx.account.account_id.clone(),
            session_id: ctx.session_id.to_string(),
            round_id: ctx.round_id.to_string(),
            game_id: ctx.game_id.to_string(),
            kind,
            amount,
            win_amount: None,
            delta,
            status: TransactionStatus::Completed,
            frb_id: None,
            created_at: Utc::now(),
        }
    }

    fn balances(&self, account: &Account, balance: Decimal, api_version: &str) -> WalletBalances {
        WalletBalances::new(balance, currency::scale_for(&account.currency), api_version)
    }

    fn current_balances(&self, account: &Account, api_version: &str) -> Result<WalletBalances, Rejection> {
        let balance = self.store.balance(&account.user_id)?;
        Ok(self.balances(account, balance, api_version))
    }

    /// Turns a rejection into the operation's response shape
    fn respond<R: ProtocolResponse>(
        &self,
        kind: RequestKind,
        transaction_id: &str,
        api_version: &str,
        outcome: Result<R, Rejection>,
    ) -> R {
        let rejection = match outcome {
            Ok(response) => return response,
            Err(rejection) => rejection,
        };

        match &rejection.source {
            Some(source) => error!(
                request = kind.as_str(),
                transaction_id,
                error = %source,
                "Technical failure"
            ),
            None => warn!(
                request = kind.as_str(),
                transaction_id,
                code = rejection.code.code(),
                reason = %rejection.reason,
                "Request rejected"
            ),
        }

        let balances = match &rejection.account {
            Some(account) => {
                let balance = self.store.balance(&account.user_id).unwrap_or(Decimal::ZERO);
                self.balances(account, balance, api_version)
            }
            None => WalletBalances::new(Decimal::ZERO, 2, api_version),
        };
        R::rejected(rejection.code, balances)
    }
}
