//! RocksDB-backed wallet store
//!
//! Every commit is a single `WriteBatch`. A commit lock linearises the
//! read-validate-write sequence so the duplicate and funds checks see the
//! same state the batch is written against.

use super::{
    apply_delta, check_transition, non_negative, BalanceLedger, CommitOutcome, LedgerCommit, PutOutcome,
    TransactionStore, WalletStore,
};
use crate::errors::{StorageError, WalletError, WalletResult};
use crate::models::TransactionRecord;
use rocksdb::{Options, WriteBatch, DB};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const BALANCE_PREFIX: &str = "balance:";
const TRANSACTION_PREFIX: &str = "txn:";

fn balance_key(user_id: &str) -> Vec<u8> {
    format!("{}{}", BALANCE_PREFIX, user_id).into_bytes()
}

fn transaction_key(key: &str) -> Vec<u8> {
    format!("{}{}", TRANSACTION_PREFIX, key).into_bytes()
}

/// Durable store surviving restarts
#[derive(Clone)]
pub struct RocksWalletStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksWalletStore {
    pub fn open<P: AsRef<Path>>(path: P) -> WalletResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| WalletError::Storage(StorageError::DatabaseOpenFailed(e.to_string())))?;

        info!("💾 Wallet store opened at {}", path.as_ref().display());
        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Removes any existing database before opening (testing only)
    pub fn open_fresh<P: AsRef<Path>>(path: P) -> WalletResult<Self> {
        if path.as_ref().exists() {
            DB::destroy(&Options::default(), path.as_ref())
                .map_err(|e| WalletError::Storage(StorageError::WriteFailed(e.to_string())))?;
        }
        Self::open(path)
    }

    fn read_balance(&self, user_id: &str) -> WalletResult<Decimal> {
        match self
            .db
            .get(balance_key(user_id))
            .map_err(|e| WalletError::Storage(StorageError::ReadFailed(e.to_string())))?
        {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Decimal::ZERO),
        }
    }

    fn read_record(&self, key: &str) -> WalletResult<Option<TransactionRecord>> {
        match self
            .db
            .get(transaction_key(key))
            .map_err(|e| WalletError::Storage(StorageError::ReadFailed(e.to_string())))?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl BalanceLedger for RocksWalletStore {
    fn balance(&self, user_id: &str) -> WalletResult<Decimal> {
        self.read_balance(user_id)
    }

    fn add(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal> {
        let amount = non_negative(amount)?;
        match self.commit(LedgerCommit::new(user_id, amount))? {
            CommitOutcome::Applied { balance } => Ok(balance),
            CommitOutcome::Duplicate(_) => self.read_balance(user_id),
        }
    }

    fn deduct(&self, user_id: &str, amount: Decimal) -> WalletResult<Decimal> {
        let amount = non_negative(amount)?;
        match self.commit(LedgerCommit::new(user_id, -amount))? {
            CommitOutcome::Applied { balance } => Ok(balance),
            CommitOutcome::Duplicate(_) => self.read_balance(user_id),
        }
    }
}

impl TransactionStore for RocksWalletStore {
    fn get(&self, key: &str) -> WalletResult<Option<TransactionRecord>> {
        self.read_record(key)
    }

    fn put(&self, record: TransactionRecord) -> WalletResult<PutOutcome> {
        let user_id = record.user_id.clone();
        match self.commit(LedgerCommit::new(user_id, Decimal::ZERO).insert(record))? {
            CommitOutcome::Applied { .. } => Ok(PutOutcome::Inserted),
            CommitOutcome::Duplicate(existing) => Ok(PutOutcome::Existing(existing)),
        }
    }
}

impl WalletStore for RocksWalletStore {
    fn commit(&self, commit: LedgerCommit) -> WalletResult<CommitOutcome> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|e| WalletError::Storage(StorageError::LockPoisoned(e.to_string())))?;

        for record in &commit.inserts {
            if let Some(existing) = self.read_record(&record.key)? {
                return Ok(CommitOutcome::Duplicate(existing));
            }
        }

        let mut updated: HashMap<String, TransactionRecord> = HashMap::new();
        for (key, status) in &commit.status_updates {
            let current = self.read_record(key)?;
            check_transition(key, current.as_ref(), *status)?;
            if let Some(mut record) = current {
                record.status = *status;
                updated.insert(key.clone(), record);
            }
        }

        let balance = apply_delta(self.read_balance(&commit.user_id)?, commit.delta)?;

        let mut batch = WriteBatch::default();
        batch.put(balance_key(&commit.user_id), serde_json::to_vec(&balance)?);
        for record in &commit.inserts {
            batch.put(transaction_key(&record.key), serde_json::to_vec(record)?);
        }
        for (key, record) in &updated {
            batch.put(transaction_key(key), serde_json::to_vec(record)?);
        }

        self.db
            .write(batch)
            .map_err(|e| WalletError::Storage(StorageError::WriteFailed(e.to_string())))?;

        Ok(CommitOutcome::Applied { balance })
    }
}
