//! Response bodies in the exact shape the provider expects
//!
//! Amounts serialize as decimal strings already rescaled to the account
//! currency. Bonus balances and bonus legs are always zero.

use super::{ProtocolCode, DUPLICATE_STATUS};
use crate::currency;
use rust_decimal::Decimal;
use serde::Serialize;

const GAME_MODE_REAL: u8 = 1;
const ORDER_CASH_FIRST: &str = "cash_money";

/// Balance block shared by most responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletBalances {
    pub balance: Decimal,
    pub bonus_balance: Decimal,
    pub real_balance: Decimal,
    pub game_mode: u8,
    pub order: String,
    pub apiversion: String,
    #[serde(skip)]
    pub scale: u32,
}

impl WalletBalances {
    pub fn new(balance: Decimal, scale: u32, api_version: &str) -> Self {
        let balance = currency::at_scale(balance, scale);
        Self {
            balance,
            bonus_balance: currency::at_scale(Decimal::ZERO, scale),
            real_balance: balance,
            game_mode: GAME_MODE_REAL,
            order: ORDER_CASH_FIRST.to_string(),
            apiversion: api_version.to_string(),
            scale,
        }
    }
}

/// Code and status pair; replays keep code 200 with the duplicate status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub code: ProtocolCode,
    pub duplicate: bool,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            code: ProtocolCode::Success,
            duplicate: false,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            code: ProtocolCode::Success,
            duplicate: true,
        }
    }

    pub fn rejected(code: ProtocolCode) -> Self {
        Self { code, duplicate: false }
    }

    pub fn parts(self) -> (u16, String) {
        let status = if self.duplicate { DUPLICATE_STATUS } else { self.code.status() };
        (self.code.code(), status.to_string())
    }
}

/// Responses that can carry a business rejection
pub trait ProtocolResponse: Sized {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self;

    fn code(&self) -> u16;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountResponse {
    pub code: u16,
    pub status: String,
    pub accountid: String,
    pub city: String,
    pub country: String,
    pub currency: String,
    pub gamesessionid: String,
    pub real_balance: Decimal,
    pub bonus_balance: Decimal,
    pub game_mode: u8,
    pub order: String,
    pub apiversion: String,
}

impl ProtocolResponse for AccountResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        let (code, status) = Outcome::rejected(code).parts();
        Self {
            code,
            status,
            accountid: String::new(),
            city: String::new(),
            country: String::new(),
            currency: String::new(),
            gamesessionid: String::new(),
            real_balance: balances.real_balance,
            bonus_balance: balances.bonus_balance,
            game_mode: balances.game_mode,
            order: balances.order,
            apiversion: balances.apiversion,
        }
    }

    fn code(&self) -> u16 {
        self.code
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceResponse {
    pub code: u16,
    pub status: String,
    #[serde(flatten)]
    pub balances: WalletBalances,
}

impl BalanceResponse {
    pub fn new(outcome: Outcome, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        Self { code, status, balances }
    }
}

impl ProtocolResponse for BalanceResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WagerResponse {
    pub code: u16,
    pub status: String,
    pub accounttransactionid: String,
    pub bonusmoneybet: Decimal,
    pub realmoneybet: Decimal,
    #[serde(flatten)]
    pub balances: WalletBalances,
}

impl WagerResponse {
    pub fn new(outcome: Outcome, wallet_tx: &str, bet: Decimal, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        let scale = balances.scale;
        Self {
            code,
            status,
            accounttransactionid: wallet_tx.to_string(),
            bonusmoneybet: currency::at_scale(Decimal::ZERO, scale),
            realmoneybet: currency::at_scale(bet, scale),
            balances,
        }
    }
}

impl ProtocolResponse for WagerResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), "", Decimal::ZERO, balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

/// Result and jackpot credits
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultResponse {
    pub code: u16,
    pub status: String,
    #[serde(rename = "walletTx")]
    pub wallet_tx: String,
    #[serde(rename = "bonusWin")]
    pub bonus_win: Decimal,
    #[serde(rename = "realMoneyWin")]
    pub real_money_win: Decimal,
    #[serde(flatten)]
    pub balances: WalletBalances,
}

pub type JackpotResponse = ResultResponse;

impl ResultResponse {
    pub fn new(outcome: Outcome, wallet_tx: &str, win: Decimal, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        let scale = balances.scale;
        Self {
            code,
            status,
            wallet_tx: wallet_tx.to_string(),
            bonus_win: currency::at_scale(Decimal::ZERO, scale),
            real_money_win: currency::at_scale(win, scale),
            balances,
        }
    }
}

impl ProtocolResponse for ResultResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), "", Decimal::ZERO, balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WagerAndResultResponse {
    pub code: u16,
    pub status: String,
    #[serde(rename = "walletTx")]
    pub wallet_tx: String,
    #[serde(rename = "bonusWin")]
    pub bonus_win: Decimal,
    #[serde(rename = "realMoneyWin")]
    pub real_money_win: Decimal,
    pub bonusmoneybet: Decimal,
    pub realmoneybet: Decimal,
    #[serde(flatten)]
    pub balances: WalletBalances,
}

impl WagerAndResultResponse {
    pub fn new(outcome: Outcome, wallet_tx: &str, bet: Decimal, win: Decimal, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        let scale = balances.scale;
        let zero = currency::at_scale(Decimal::ZERO, scale);
        Self {
            code,
            status,
            wallet_tx: wallet_tx.to_string(),
            bonus_win: zero,
            real_money_win: currency::at_scale(win, scale),
            bonusmoneybet: zero,
            realmoneybet: currency::at_scale(bet, scale),
            balances,
        }
    }
}

impl ProtocolResponse for WagerAndResultResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), "", Decimal::ZERO, Decimal::ZERO, balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

/// Rollback, reversewin and rollbackrollback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReversalResponse {
    pub code: u16,
    pub status: String,
    pub accounttransactionid: String,
    #[serde(flatten)]
    pub balances: WalletBalances,
}

impl ReversalResponse {
    pub fn new(outcome: Outcome, wallet_tx: &str, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        Self {
            code,
            status,
            accounttransactionid: wallet_tx.to_string(),
            balances,
        }
    }
}

impl ProtocolResponse for ReversalResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), "", balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchBetResult {
    pub provider_transaction_id: String,
    pub transaction_id: String,
    pub bonus_money_bet: Decimal,
    pub real_money_bet: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchWagerResponse {
    pub status: String,
    pub code: u16,
    pub message: String,
    pub bets: Vec<BatchBetResult>,
    pub balance: Decimal,
    pub real_balance: Decimal,
    pub bonus_balance: Decimal,
}

impl BatchWagerResponse {
    pub fn new(outcome: Outcome, message: &str, bets: Vec<BatchBetResult>, balances: WalletBalances) -> Self {
        let (code, status) = outcome.parts();
        Self {
            status,
            code,
            message: message.to_string(),
            bets,
            balance: balances.balance,
            real_balance: balances.real_balance,
            bonus_balance: balances.bonus_balance,
        }
    }
}

impl ProtocolResponse for BatchWagerResponse {
    fn rejected(code: ProtocolCode, balances: WalletBalances) -> Self {
        Self::new(Outcome::rejected(code), code.status(), Vec::new(), balances)
    }

    fn code(&self) -> u16 {
        self.code
    }
}

/// Any response the dispatcher can return
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProviderResponse {
    Account(AccountResponse),
    Balance(BalanceResponse),
    Wager(WagerResponse),
    Result(ResultResponse),
    WagerAndResult(WagerAndResultResponse),
    Reversal(ReversalResponse),
    Batch(BatchWagerResponse),
}

impl ProviderResponse {
    pub fn code(&self) -> u16 {
        match self {
            ProviderResponse::Account(r) => r.code,
            ProviderResponse::Balance(r) => r.code,
            ProviderResponse::Wager(r) => r.code,
            ProviderResponse::Result(r) => r.code,
            ProviderResponse::WagerAndResult(r) => r.code,
            ProviderResponse::Reversal(r) => r.code,
            ProviderResponse::Batch(r) => r.code,
        }
    }

    pub fn status(&self) -> &str {
        match self {
            ProviderResponse::Account(r) => &r.status,
            ProviderResponse::Balance(r) => &r.status,
            ProviderResponse::Wager(r) => &r.status,
            ProviderResponse::Result(r) => &r.status,
            ProviderResponse::WagerAndResult(r) => &r.status,
            ProviderResponse::Reversal(r) => &r.status,
            ProviderResponse::Batch(r) => &r.status,
        }
    }
}
