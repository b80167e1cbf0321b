//! Core wallet data model
//!
//! Accounts and sessions are owned by external subsystems and only read here.
//! `TransactionRecord` is the audit row written once per provider operation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Player account as seen by the wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Internal user id; keys the balance ledger
    pub user_id: String,
    /// External account id the provider knows; immutable once assigned
    pub account_id: String,
    pub currency: String,
    pub status: AccountStatus,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Account {
    pub fn new(user_id: impl Into<String>, account_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            account_id: account_id.into(),
            currency: currency.into(),
            status: AccountStatus::Active,
            city: None,
            country: None,
        }
    }

    pub fn with_location(mut self, city: impl Into<String>, country: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.country = Some(country.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// Game session resolved by the session subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

/// Kind of provider operation a record was written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Wager,
    Result,
    WagerAndResult,
    Rollback,
    RollbackOnResult,
    RollbackOnRollback,
    Jackpot,
    BatchItem,
}

impl OperationKind {
    /// Store key for a provider transaction id under this operation
    pub fn idempotency_key(self, transaction_id: &str) -> String {
        match self {
            OperationKind::Wager
            | OperationKind::WagerAndResult
            | OperationKind::Jackpot
            | OperationKind::BatchItem => transaction_id.to_string(),
            OperationKind::Result => format!("{}_result", transaction_id),
            OperationKind::Rollback => format!("{}_rollback", transaction_id),
            OperationKind::RollbackOnResult => format!("{}_rollback_result", transaction_id),
            OperationKind::RollbackOnRollback => format!("{}_rollback_rollback", transaction_id),
        }
    }

    /// Open stakes: wagers still waiting for a result or a rollback
    pub fn is_stake(self) -> bool {
        matches!(self, OperationKind::Wager | OperationKind::BatchItem)
    }

    /// Wagers that a rollback may reverse
    pub fn is_rollback_eligible(self) -> bool {
        self.is_stake()
    }
}

/// Forward-only lifecycle of a transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    RolledBack,
}

impl TransactionStatus {
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::RolledBack)
                | (TransactionStatus::Completed, TransactionStatus::RolledBack)
        )
    }
}

/// One processed provider operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Idempotency key, see [`OperationKind::idempotency_key`]
    pub key: String,
    /// Provider-supplied transaction id
    pub transaction_id: String,
    /// Wallet-side transaction id returned as `accounttransactionid`/`walletTx`
    pub wallet_transaction_id: String,
    pub user_id: String,
    pub account_id: String,
    pub session_id: String,
    pub round_id: String,
    pub game_id: String,
    pub kind: OperationKind,
    /// Nominal amount of the operation (bet, win, rollback or jackpot amount)
    pub amount: Decimal,
    /// Win leg for combined wager-and-result operations
    #[serde(default)]
    pub win_amount: Option<Decimal>,
    /// Signed effect applied to the balance
    pub delta: Decimal,
    pub status: TransactionStatus,
    #[serde(default)]
    pub frb_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            other => Err(format!("device must be desktop or mobile, got '{}'", other)),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Desktop => write!(f, "desktop"),
            Device::Mobile => write!(f, "mobile"),
        }
    }
}

/// Round state reported alongside results and jackpots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Completed,
    Pending,
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(GameStatus::Completed),
            "pending" => Ok(GameStatus::Pending),
            other => Err(format!("gamestatus must be completed or pending, got '{}'", other)),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Completed => write!(f, "completed"),
            GameStatus::Pending => write!(f, "pending"),
        }
    }
}
