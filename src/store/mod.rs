//! Balance ledger and transaction store
//!
//! Both contracts are backed by one atomic primitive, [`WalletStore::commit`]:
//! a commit either inserts all of its records, applies its balance delta and
//! its status updates, or changes nothing. Duplicate detection happens inside
//! the same critical section as the insert, so two concurrent deliveries of
//! one transaction id can never both be treated as new.

pub mod memory;
pub mod rocks;

pub use memory::MemoryWalletStore;
pub use rocks::RocksWalletStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{LedgerError, WalletResult};
use crate::models::{TransactionRecord, TransactionStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Atomic per-user balance operations
pub trait BalanceLedger: Send + Sync {
    /// Current balance; users never credited read as zero
    fn balance(&self, user_id: &str) -> WalletResult<Decimal>;

    /// Credit `amount` and return the new balance
    fn add(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal>;

    /// Debit `amount`; fails with `LedgerError::InsufficientFunds` rather than go negative
    fn deduct(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal>;
}

/// Keyed, append-only record of processed operations
pub trait TransactionStore: Send + Sync {
    fn get(&self, key: &str) -> WalletResult<Option<TransactionRecord>>;

    /// Create-or-fail insert; the first writer wins
    fn put(&self, record: TransactionRecord) -> WalletResult<PutOutcome>;
}

/// Ledger and store committed together
pub trait WalletStore: BalanceLedger + TransactionStore {
    fn commit(&self, commit: LedgerCommit) -> WalletResult<CommitOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    Inserted,
    /// A record already held the key; it is returned unchanged
    Existing(TransactionRecord),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Applied { balance: Decimal },
    /// One of the new records already existed; nothing was applied
    Duplicate(TransactionRecord),
}

/// One atomic unit of ledger work for a single user
#[derive(Debug, Clone, Default)]
pub struct LedgerCommit {
    pub user_id: String,
    /// Signed balance change
    pub delta: Decimal,
    /// Records that must not already exist
    pub inserts: Vec<TransactionRecord>,
    /// Forward-only status changes on existing records
    pub status_updates: Vec<(String, TransactionStatus)>,
}

impl LedgerCommit {
    pub fn new(user_id: impl Into<String>, delta: Decimal) -> Self {
        Self {
            user_id: user_id.into(),
            delta,
            ..Default::default()
        }
    }

    pub fn insert(mut self, record: TransactionRecord) -> Self {
        self.inserts.push(record);
        self
    }

    pub fn update_status(mut self, key: impl Into<String>, status: TransactionStatus) -> Self {
        self.status_updates.push((key.into(), status));
        self
    }
}

/// Open the backend named by configuration
pub fn open_store(config: &StorageConfig) -> WalletResult<Arc<dyn WalletStore>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("💾 Using in-memory wallet store");
            Ok(Arc::new(MemoryWalletStore::new()))
        }
        StorageBackend::RocksDb if config.clear_on_start => {
            Ok(Arc::new(RocksWalletStore::open_fresh(&config.data_directory)?))
        }
        StorageBackend::RocksDb => Ok(Arc::new(RocksWalletStore::open(&config.data_directory)?)),
    }
}

/// Balance after applying `delta`, refusing negative results
pub(crate) fn apply_delta(balance: Decimal, delta: Decimal) -> WalletResult<Decimal> {
    let next = balance.checked_add(delta).ok_or(LedgerError::Overflow)?;
    if next.is_sign_negative() && !next.is_zero() {
        return Err(LedgerError::InsufficientFunds {
            balance,
            requested: -delta,
        }
        .into());
    }
    Ok(next)
}

/// Checks a status update against the record it targets
pub(crate) fn check_transition(
    key: &str,
    record: Option<&TransactionRecord>,
    next: TransactionStatus,
) -> WalletResult<()> {
    let record = record.ok_or_else(|| LedgerError::UnknownTransaction(key.to_string()))?;
    if !record.status.can_transition_to(next) {
        return Err(LedgerError::InvalidTransition {
            key: key.to_string(),
            from: record.status,
            to: next,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn non_negative(amount: Decimal) -> WalletResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::NegativeAmount(amount).into());
    }
    Ok(amount)
}
