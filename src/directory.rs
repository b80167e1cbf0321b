//! Session and account lookups
//!
//! The wallet only reads sessions and accounts; both are owned by other
//! subsystems. The traits are the seam; the in-memory implementations serve
//! the standalone binary and the tests.

use crate::errors::{DirectoryError, WalletResult};
use crate::models::{Account, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

/// Why a session could not be used
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error("session inactive")]
    Inactive,
    #[error("session service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionOracle: Send + Sync {
    async fn validate(&self, session_id: &str) -> Result<Session, SessionError>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_by_user_id(&self, user_id: &str) -> WalletResult<Option<Account>>;

    async fn get_by_account_id(&self, account_id: &str) -> WalletResult<Option<Account>>;

    /// Returns the user's account, creating it on first contact
    async fn get_or_create(&self, user_id: &str) -> WalletResult<Account>;
}

/// Session table keyed by session id
#[derive(Default)]
pub struct InMemorySessionOracle {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.session_id.clone(), session);
    }

    /// Opens an active session for `user_id` valid until `expires_at`
    pub fn open(&self, session_id: &str, user_id: &str, expires_at: DateTime<Utc>) {
        self.insert(Session {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            expires_at,
            active: true,
        });
    }

    pub fn expire(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub fn deactivate(&self, session_id: &str) {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.active = false;
        }
    }
}

#[async_trait]
impl SessionOracle for InMemorySessionOracle {
    async fn validate(&self, session_id: &str) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::NotFound)?;

        if !session.active {
            return Err(SessionError::Inactive);
        }
        if session.expires_at <= Utc::now() {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }
}

/// Account table indexed by user id and by external account id
pub struct InMemoryAccountDirectory {
    by_user: DashMap<String, Account>,
    user_by_account: DashMap<String, String>,
    default_currency: String,
}

impl InMemoryAccountDirectory {
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            by_user: DashMap::new(),
            user_by_account: DashMap::new(),
            default_currency: default_currency.into(),
        }
    }

    pub fn insert(&self, account: Account) -> WalletResult<()> {
        if let Some(owner) = self.user_by_account.get(&account.account_id) {
            if *owner != account.user_id {
                return Err(DirectoryError::AccountConflict {
                    account_id: account.account_id.clone(),
                }
                .into());
            }
        }
        self.user_by_account
            .insert(account.account_id.clone(), account.user_id.clone());
        self.by_user.insert(account.user_id.clone(), account);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn get_by_user_id(&self, user_id: &str) -> WalletResult<Option<Account>> {
        Ok(self.by_user.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn get_by_account_id(&self, account_id: &str) -> WalletResult<Option<Account>> {
        let user_id = match self.user_by_account.get(account_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        self.get_by_user_id(&user_id).await
    }

    async fn get_or_create(&self, user_id: &str) -> WalletResult<Account> {
        // The user id doubles as the external account id for new accounts
        let account = self
            .by_user
            .entry(user_id.to_string())
            .or_insert_with(|| Account::new(user_id, user_id, self.default_currency.clone()))
            .value()
            .clone();
        self.user_by_account
            .entry(account.account_id.clone())
            .or_insert_with(|| account.user_id.clone());
        Ok(account)
    }
}
