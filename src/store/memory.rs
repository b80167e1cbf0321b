//! In-process wallet store
//!
//! Balances and records sit behind a single `RwLock`, so a commit's
//! duplicate check, funds check and writes happen in one critical section.
//! Reads take the shared side.

use super::{
    apply_delta, check_transition, non_negative, BalanceLedger, CommitOutcome, LedgerCommit, PutOutcome,
    TransactionStore, WalletStore,
};
use crate::errors::{StorageError, WalletError, WalletResult};
use crate::models::TransactionRecord;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, Decimal>,
    records: HashMap<String, TransactionRecord>,
}

/// Volatile store for development and tests
#[derive(Default)]
pub struct MemoryWalletStore {
    state: RwLock<LedgerState>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transaction records
    pub fn record_count(&self) -> usize {
        self.read().map(|state| state.records.len()).unwrap_or(0)
    }

    fn read(&self) -> WalletResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|e| WalletError::Storage(StorageError::LockPoisoned(e.to_string())))
    }

    fn write(&self) -> WalletResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|e| WalletError::Storage(StorageError::LockPoisoned(e.to_string())))
    }
}

impl BalanceLedger for MemoryWalletStore {
    fn balance(&self, user_id: &str) -> WalletResult<Decimal> {
        Ok(self.read()?.balances.get(user_id).copied().unwrap_or(Decimal::ZERO))
    }

    fn add(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal> {
        let amount = non_negative(amount)?;
        match self.commit(LedgerCommit::new(user_id, amount))? {
            CommitOutcome::Applied { balance } => Ok(balance),
            CommitOutcome::Duplicate(_) => self.balance(user_id),
        }
    }

    fn deduct(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal> {
        let amount = non_negative(amount)?;
        match self.commit(LedgerCommit::new(user_id, -amount))? {
            CommitOutcome::Applied { balance } => Ok(balance),
            CommitOutcome::Duplicate(_) => self.balance(user_id),
        }
    }
}

impl TransactionStore for MemoryWalletStore {
    fn get(&self, key: &str) -> WalletResult<Option<TransactionRecord>> {
        Ok(self.read()?.records.get(key).cloned())
    }

    fn put(&self, record: TransactionRecord) -> WalletResult<PutOutcome> {
        let user_id = record.user_id.clone();
        match self.commit(LedgerCommit::new(user_id, Decimal::ZERO).insert(record))? {
            CommitOutcome::Applied { .. } => Ok(PutOutcome::Inserted),
            CommitOutcome::Duplicate(existing) => Ok(PutOutcome::Existing(existing)),
        }
    }
}

impl WalletStore for MemoryWalletStore {
    fn commit(&self, commit: LedgerCommit) -> WalletResult<CommitOutcome> {
        let mut state = self.write()?;

        for record in &commit.inserts {
            if let Some(existing) = state.records.get(&record.key) {
                return Ok(CommitOutcome::Duplicate(existing.clone()));
            }
        }

        for (key, status) in &commit.status_updates {
            check_transition(key, state.records.get(key), *status)?;
        }

        let current = state.balances.get(&commit.user_id).copied().unwrap_or(Decimal::ZERO);
        let balance = apply_delta(current, commit.delta)?;

        state.balances.insert(commit.user_id.clone(), balance);
        for record in commit.inserts {
            state.records.insert(record.key.clone(), record);
        }
        for (key, status) in commit.status_updates {
            if let Some(record) = state.records.get_mut(&key) {
                record.status = status;
            }
        }

        Ok(CommitOutcome::Applied { balance })
    }
}
