//! Error types for the Groove wallet engine
//!
//! One root error with a sub-enum per concern. Business rejections that the
//! provider protocol encodes as result codes are NOT errors here; they live in
//! `protocol::ProtocolCode`. Everything in this module is an infrastructure or
//! invariant failure.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::TransactionStatus;

/// Root error type for all wallet operations
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Server error: {0}")]
    Server(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Missing required field: {0}")]
    MissingRequired(String),
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database: {0}")]
    DatabaseOpenFailed(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Data corruption detected: {0}")]
    CorruptedData(String),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Balance ledger invariant violations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("balance arithmetic overflow")]
    Overflow,
    #[error("transaction {key} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        key: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },
    #[error("transaction {0} not found for status update")]
    UnknownTransaction(String),
}

/// Account and session directory errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
    #[error("Account id {account_id} already bound to another user")]
    AccountConflict { account_id: String },
}

/// Result type alias for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    /// True when the failure is the ledger refusing a debit
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, WalletError::Ledger(LedgerError::InsufficientFunds { .. }))
    }
}

impl From<rocksdb::Error> for WalletError {
    fn from(err: rocksdb::Error) -> Self {
        WalletError::Storage(StorageError::WriteFailed(err.to_string()))
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Storage(StorageError::ReadFailed(err.to_string()))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Storage(StorageError::CorruptedData(err.to_string()))
    }
}
