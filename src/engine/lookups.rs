//! Read-only lookups: getaccount and getbalance
//!
//! Both are session-bound and create the account on first contact.

use super::{Rejection, TransactionEngine};
use crate::currency;
use crate::models::Account;
use crate::protocol::request::{GetAccountRequest, GetBalanceRequest, RequestKind, SessionContext};
use crate::protocol::response::{AccountResponse, BalanceResponse, Outcome};
use crate::protocol::ProtocolCode;
use tracing::debug;

impl TransactionEngine {
    /// Player profile for the session, creating the account on first contact
    pub async fn get_account(&self, request: &GetAccountRequest) -> AccountResponse {
        let outcome = self.try_get_account(request).await;
        self.respond(RequestKind::GetAccount, "", &request.context.api_version, outcome)
    }

    async fn try_get_account(&self, request: &GetAccountRequest) -> Result<AccountResponse, Rejection> {
        let ctx = &request.context;
        let account = self.session_owner(ctx).await?;
        let balances = self.current_balances(&account, &ctx.api_version)?;
        let (code, status) = Outcome::success().parts();

        debug!(account_id = %account.account_id, "Account lookup");
        Ok(AccountResponse {
            code,
            status,
            accountid: account.account_id.clone(),
            city: account.city.clone().unwrap_or_default(),
            country: account.country.clone().unwrap_or_default(),
            currency: account.currency.clone(),
            gamesessionid: ctx.session_id.clone(),
            real_balance: balances.real_balance,
            bonus_balance: balances.bonus_balance,
            game_mode: balances.game_mode,
            order: balances.order,
            apiversion: balances.apiversion,
        })
    }

    pub async fn get_balance(&self, request: &GetBalanceRequest) -> BalanceResponse {
        let outcome = self.try_get_balance(request).await;
        self.respond(RequestKind::GetBalance, "", &request.context.api_version, outcome)
    }

    async fn try_get_balance(&self, request: &GetBalanceRequest) -> Result<BalanceResponse, Rejection> {
        let ctx = &request.context;
        let account = self.session_owner(ctx).await?;
        let balance = self.store.balance(&account.user_id)?;

        debug!(
            account_id = %account.account_id,
            game_id = %request.game_id,
            balance = %currency::at_scale(balance, currency::scale_for(&account.currency)),
            "Balance lookup"
        );
        Ok(BalanceResponse::new(
            Outcome::success(),
            self.balances(&account, balance, &ctx.api_version),
        ))
    }

    /// Account of the session's user; `accountid` must name it
    async fn session_owner(&self, ctx: &SessionContext) -> Result<Account, Rejection> {
        let session = self.validate_session(&ctx.session_id).await?;
        let account = self.accounts.get_or_create(&session.user_id).await?;
        if account.account_id != ctx.account_id {
            return Err(Rejection::business(
                ProtocolCode::OperationNotAllowed,
                format!("account {} does not belong to session", ctx.account_id),
            ));
        }
        Ok(account)
    }
}
