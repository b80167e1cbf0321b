//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{Duration, Utc};
use groove_wallet::directory::{InMemoryAccountDirectory, InMemorySessionOracle};
use groove_wallet::engine::{EngineSettings, TransactionEngine};
use groove_wallet::models::{Device, GameStatus};
use groove_wallet::protocol::request::{
    BatchBet, BatchWagerRequest, GetBalanceRequest, JackpotRequest, ResultRequest, ReverseWinRequest,
    RollbackRequest, RollbackRollbackRequest, SessionContext, WagerAndResultRequest, WagerRequest,
};
use groove_wallet::store::{BalanceLedger, MemoryWalletStore, WalletStore};
use rust_decimal::Decimal;
use std::sync::Arc;

pub const PLAYER: &str = "player-1";
pub const SESSION: &str = "sess-1";
pub const GAME: &str = "80102";

pub struct Harness {
    pub engine: Arc<TransactionEngine>,
    pub store: Arc<MemoryWalletStore>,
    pub sessions: Arc<InMemorySessionOracle>,
    pub accounts: Arc<InMemoryAccountDirectory>,
}

impl Harness {
    /// One player with an open session and `balance` in the wallet
    pub fn with_balance(balance: Decimal) -> Self {
        let store = Arc::new(MemoryWalletStore::new());
        Self::over_store(store, balance)
    }

    pub fn over_store(store: Arc<MemoryWalletStore>, balance: Decimal) -> Self {
        let sessions = Arc::new(InMemorySessionOracle::new());
        sessions.open(SESSION, PLAYER, Utc::now() + Duration::hours(1));
        let accounts = Arc::new(InMemoryAccountDirectory::new("USD"));
        if !balance.is_zero() {
            store.add(PLAYER, balance).unwrap();
        }
        let wallet: Arc<dyn WalletStore> = store.clone();
        let engine = Arc::new(TransactionEngine::new(
            wallet,
            sessions.clone(),
            accounts.clone(),
            EngineSettings::default(),
        ));
        Self {
            engine,
            store,
            sessions,
            accounts,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.store.balance(PLAYER).unwrap()
    }
}

pub fn context() -> SessionContext {
    context_for(PLAYER, SESSION)
}

pub fn context_for(account_id: &str, session_id: &str) -> SessionContext {
    SessionContext {
        account_id: account_id.to_string(),
        session_id: session_id.to_string(),
        device: Some(Device::Desktop),
        api_version: "1.2".to_string(),
    }
}

pub fn wager(transaction_id: &str, bet: Decimal) -> WagerRequest {
    WagerRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        bet_amount: bet,
        frb_id: None,
    }
}

pub fn result(transaction_id: &str, win: Decimal) -> ResultRequest {
    ResultRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        result_amount: win,
        game_status: GameStatus::Completed,
        frb_id: None,
    }
}

pub fn wager_and_result(transaction_id: &str, bet: Decimal, win: Decimal) -> WagerAndResultRequest {
    WagerAndResultRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        bet_amount: bet,
        win_amount: win,
        game_status: Some(GameStatus::Completed),
        frb_id: None,
    }
}

pub fn rollback(transaction_id: &str, amount: Option<Decimal>) -> RollbackRequest {
    RollbackRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: None,
        transaction_id: transaction_id.to_string(),
        rollback_amount: amount,
    }
}

pub fn rollback_rollback(transaction_id: &str) -> RollbackRollbackRequest {
    RollbackRollbackRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        rollback_amount: None,
    }
}

pub fn reverse_win(transaction_id: &str, amount: Decimal) -> ReverseWinRequest {
    ReverseWinRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        amount,
        win_transaction_id: None,
    }
}

pub fn jackpot(transaction_id: &str, amount: Decimal) -> JackpotRequest {
    JackpotRequest {
        context: context(),
        game_id: GAME.to_string(),
        round_id: format!("round-{}", transaction_id),
        transaction_id: transaction_id.to_string(),
        amount,
        game_status: GameStatus::Completed,
        frb_id: None,
    }
}

pub fn get_balance() -> GetBalanceRequest {
    GetBalanceRequest {
        context: context(),
        game_id: GAME.to_string(),
    }
}

pub fn batch(bets: &[(&str, Decimal)]) -> BatchWagerRequest {
    BatchWagerRequest {
        account_id: PLAYER.to_string(),
        game_id: GAME.to_string(),
        game_session_id: SESSION.to_string(),
        device: Device::Desktop,
        bets: bets
            .iter()
            .map(|(transaction_id, amount)| BatchBet {
                frb_id: None,
                amount: *amount,
                round_id: format!("round-{}", transaction_id),
                transaction_id: transaction_id.to_string(),
            })
            .collect(),
        api_version: "1.2".to_string(),
    }
}
