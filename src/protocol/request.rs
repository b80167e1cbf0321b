//! Request discriminator table and typed request parsing

use super::ProtocolError;
use crate::models::{Device, GameStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Every operation the provider can call, keyed by the `request` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    GetAccount,
    GetBalance,
    Wager,
    Result,
    WagerAndResult,
    Rollback,
    Jackpot,
    ReverseWin,
    RollbackRollback,
    WagerByBatch,
}

/// Discriminator value → operation
const DISPATCH_TABLE: [(&str, RequestKind); 10] = [
    ("getaccount", RequestKind::GetAccount),
    ("getbalance", RequestKind::GetBalance),
    ("wager", RequestKind::Wager),
    ("result", RequestKind::Result),
    ("wagerAndResult", RequestKind::WagerAndResult),
    ("rollback", RequestKind::Rollback),
    ("jackpot", RequestKind::Jackpot),
    ("reversewin", RequestKind::ReverseWin),
    ("rollbackrollback", RequestKind::RollbackRollback),
    ("wagerbybatch", RequestKind::WagerByBatch),
];

impl RequestKind {
    pub const ALL: [RequestKind; 10] = [
        RequestKind::GetAccount,
        RequestKind::GetBalance,
        RequestKind::Wager,
        RequestKind::Result,
        RequestKind::WagerAndResult,
        RequestKind::Rollback,
        RequestKind::Jackpot,
        RequestKind::ReverseWin,
        RequestKind::RollbackRollback,
        RequestKind::WagerByBatch,
    ];

    pub fn from_discriminator(value: &str) -> Option<Self> {
        DISPATCH_TABLE
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(self) -> &'static str {
        DISPATCH_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }

    pub fn valid_list() -> String {
        DISPATCH_TABLE
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Whether the `request` parameter is part of the signed payload, per operation
#[derive(Debug, Clone)]
pub struct SignaturePolicy {
    include_request_key: HashMap<RequestKind, bool>,
}

impl SignaturePolicy {
    /// Builds the policy from a name → flag table that must cover every operation
    pub fn from_table(table: &BTreeMap<String, bool>) -> Result<Self, String> {
        let mut include_request_key = HashMap::new();
        for (name, include) in table {
            let kind = RequestKind::from_discriminator(name)
                .ok_or_else(|| format!("unknown operation '{}' in include_request_key", name))?;
            include_request_key.insert(kind, *include);
        }

        let missing: Vec<&str> = RequestKind::ALL
            .iter()
            .filter(|kind| !include_request_key.contains_key(*kind))
            .map(|kind| kind.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!("include_request_key has no entry for: {}", missing.join(", ")));
        }

        Ok(Self { include_request_key })
    }

    /// Table with the request key excluded everywhere
    pub fn default_table() -> BTreeMap<String, bool> {
        RequestKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), false))
            .collect()
    }

    pub fn includes_request_key(&self, kind: RequestKind) -> bool {
        self.include_request_key.get(&kind).copied().unwrap_or(false)
    }
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            include_request_key: RequestKind::ALL.iter().map(|kind| (*kind, false)).collect(),
        }
    }
}

/// Query parameters of one provider call; the first occurrence of a key wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderParams {
    values: BTreeMap<String, String>,
}

impl ProviderParams {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            values.entry(key.into()).or_insert_with(|| value.into());
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn discriminator(&self) -> Result<RequestKind, ProtocolError> {
        let value = self
            .get(crate::signature::REQUEST_KEY)
            .ok_or_else(|| ProtocolError::UnknownRequest(String::new()))?;
        RequestKind::from_discriminator(value).ok_or_else(|| ProtocolError::UnknownRequest(value.to_string()))
    }
}

/// Collects required fields so every missing one is reported together
struct Fields<'a> {
    params: &'a ProviderParams,
    missing: Vec<String>,
}

impl<'a> Fields<'a> {
    fn new(params: &'a ProviderParams) -> Self {
        Self {
            params,
            missing: Vec::new(),
        }
    }

    fn required(&mut self, name: &str) -> String {
        match self.params.get(name).filter(|v| !v.is_empty()) {
            Some(value) => value.to_string(),
            None => {
                self.missing.push(name.to_string());
                String::new()
            }
        }
    }

    /// First present name of several accepted spellings
    fn required_any(&mut self, names: &[&str]) -> String {
        match names.iter().find_map(|name| self.optional(name)) {
            Some(value) => value,
            None => {
                self.missing.push(names[0].to_string());
                String::new()
            }
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.params
            .get(name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn finish(self) -> Result<(), ProtocolError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::MissingParameters(self.missing))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AmountRule {
    Positive,
    NonNegative,
}

fn parse_amount(name: &str, raw: &str, rule: AmountRule) -> Result<Decimal, ProtocolError> {
    let amount = Decimal::from_str_exact(raw.trim())
        .map_err(|_| ProtocolError::invalid(name, format!("'{}' is not a decimal amount", raw)))?;
    match rule {
        AmountRule::Positive if amount <= Decimal::ZERO => {
            Err(ProtocolError::invalid(name, "must be greater than zero"))
        }
        AmountRule::NonNegative if amount < Decimal::ZERO => Err(ProtocolError::invalid(name, "must not be negative")),
        _ => Ok(amount),
    }
}

fn parse_device(raw: &str) -> Result<Device, ProtocolError> {
    raw.parse().map_err(|reason: String| ProtocolError::invalid("device", reason))
}

fn parse_game_status(raw: &str) -> Result<GameStatus, ProtocolError> {
    raw.parse().map_err(|reason: String| ProtocolError::invalid("gamestatus", reason))
}

/// Parameters every GET operation carries
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub account_id: String,
    pub session_id: String,
    /// Absent only for jackpots
    pub device: Option<Device>,
    pub api_version: String,
}

impl SessionContext {
    fn read(fields: &mut Fields<'_>, with_device: bool) -> (String, String, String, String) {
        let account_id = fields.required("accountid");
        let session_id = fields.required("gamesessionid");
        let device = if with_device { fields.required("device") } else { String::new() };
        let api_version = fields.required("apiversion");
        (account_id, session_id, device, api_version)
    }

    fn build(raw: (String, String, String, String)) -> Result<Self, ProtocolError> {
        let (account_id, session_id, device, api_version) = raw;
        let device = if device.is_empty() { None } else { Some(parse_device(&device)?) };
        Ok(Self {
            account_id,
            session_id,
            device,
            api_version,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetAccountRequest {
    pub context: SessionContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetBalanceRequest {
    pub context: SessionContext,
    pub game_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WagerRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub bet_amount: Decimal,
    pub frb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub result_amount: Decimal,
    pub game_status: GameStatus,
    pub frb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WagerAndResultRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub bet_amount: Decimal,
    pub win_amount: Decimal,
    pub game_status: Option<GameStatus>,
    pub frb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollbackRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: Option<String>,
    pub transaction_id: String,
    pub rollback_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JackpotRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub game_status: GameStatus,
    pub frb_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReverseWinRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub win_transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollbackRollbackRequest {
    pub context: SessionContext,
    pub game_id: String,
    pub round_id: String,
    pub transaction_id: String,
    pub rollback_amount: Option<Decimal>,
}

/// One bet inside a batch body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchBet {
    #[serde(default)]
    pub frb_id: Option<String>,
    pub amount: Decimal,
    pub round_id: String,
    pub transaction_id: String,
}

/// Sportsbook batch: many bets debited in one commit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchWagerRequest {
    pub account_id: String,
    pub game_id: String,
    pub game_session_id: String,
    pub device: Device,
    pub bets: Vec<BatchBet>,
    /// Not part of the body; echoed from the query or configuration
    #[serde(skip)]
    pub api_version: String,
}

impl BatchWagerRequest {
    fn from_body(body: &[u8], api_version: String, max_bets: usize) -> Result<Self, ProtocolError> {
        let mut request: BatchWagerRequest =
            serde_json::from_slice(body).map_err(|e| ProtocolError::MalformedBody(e.to_string()))?;

        let mut missing = Vec::new();
        for (name, value) in [
            ("account_id", &request.account_id),
            ("game_id", &request.game_id),
            ("game_session_id", &request.game_session_id),
        ] {
            if value.is_empty() {
                missing.push(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(ProtocolError::MissingParameters(missing));
        }
        if request.bets.is_empty() {
            return Err(ProtocolError::MalformedBody("bets must contain at least one bet".to_string()));
        }
        if request.bets.len() > max_bets {
            return Err(ProtocolError::MalformedBody(format!(
                "batch of {} bets exceeds the limit of {}",
                request.bets.len(),
                max_bets
            )));
        }
        for bet in &request.bets {
            if bet.transaction_id.is_empty() || bet.round_id.is_empty() {
                return Err(ProtocolError::MissingParameters(vec![
                    "bets[].transaction_id".to_string(),
                    "bets[].round_id".to_string(),
                ]));
            }
            if bet.amount <= Decimal::ZERO {
                return Err(ProtocolError::invalid(
                    "amount",
                    format!("bet {} must be greater than zero", bet.transaction_id),
                ));
            }
        }

        request.api_version = api_version;
        Ok(request)
    }
}

/// A fully parsed provider call
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetAccount(GetAccountRequest),
    GetBalance(GetBalanceRequest),
    Wager(WagerRequest),
    Result(ResultRequest),
    WagerAndResult(WagerAndResultRequest),
    Rollback(RollbackRequest),
    Jackpot(JackpotRequest),
    ReverseWin(ReverseWinRequest),
    RollbackRollback(RollbackRollbackRequest),
    WagerByBatch(BatchWagerRequest),
}

impl Operation {
    /// Parses the call for `kind`; the body is only read for batch wagers
    pub fn parse(
        kind: RequestKind,
        params: &ProviderParams,
        body: Option<&[u8]>,
        default_api_version: &str,
        max_batch_bets: usize,
    ) -> Result<Self, ProtocolError> {
        let mut fields = Fields::new(params);

        let operation = match kind {
            RequestKind::GetAccount => {
                let context = SessionContext::read(&mut fields, true);
                fields.finish()?;
                Operation::GetAccount(GetAccountRequest {
                    context: SessionContext::build(context)?,
                })
            }
            RequestKind::GetBalance => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required_any(&["nogsgameid", "gameid"]);
                fields.finish()?;
                Operation::GetBalance(GetBalanceRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                })
            }
            RequestKind::Wager => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let bet_amount = fields.required("betamount");
                let frb_id = fields.optional("frbid");
                fields.finish()?;
                Operation::Wager(WagerRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    bet_amount: parse_amount("betamount", &bet_amount, AmountRule::Positive)?,
                    frb_id,
                })
            }
            RequestKind::Result => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let result = fields.required("result");
                let game_status = fields.required("gamestatus");
                let frb_id = fields.optional("frbid");
                fields.finish()?;
                Operation::Result(ResultRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    result_amount: parse_amount("result", &result, AmountRule::NonNegative)?,
                    game_status: parse_game_status(&game_status)?,
                    frb_id,
                })
            }
            RequestKind::WagerAndResult => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let bet_amount = fields.required("betamount");
                let result = fields.required("result");
                let game_status = fields.optional("gamestatus");
                let frb_id = fields.optional("frbid");
                fields.finish()?;
                Operation::WagerAndResult(WagerAndResultRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    bet_amount: parse_amount("betamount", &bet_amount, AmountRule::Positive)?,
                    win_amount: parse_amount("result", &result, AmountRule::NonNegative)?,
                    game_status: game_status.as_deref().map(parse_game_status).transpose()?,
                    frb_id,
                })
            }
            RequestKind::Rollback => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let transaction_id = fields.required("transactionid");
                let round_id = fields.optional("roundid");
                let rollback_amount = fields.optional("rollbackamount");
                fields.finish()?;
                Operation::Rollback(RollbackRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    rollback_amount: rollback_amount
                        .as_deref()
                        .map(|raw| parse_amount("rollbackamount", raw, AmountRule::Positive))
                        .transpose()?,
                })
            }
            RequestKind::Jackpot => {
                let context = SessionContext::read(&mut fields, false);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let amount = fields.required("amount");
                let game_status = fields.required("gamestatus");
                let frb_id = fields.optional("frbid");
                fields.finish()?;
                Operation::Jackpot(JackpotRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    amount: parse_amount("amount", &amount, AmountRule::Positive)?,
                    game_status: parse_game_status(&game_status)?,
                    frb_id,
                })
            }
            RequestKind::ReverseWin => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let amount = fields.required("amount");
                let win_transaction_id = fields.optional("wintransactionid");
                fields.finish()?;
                Operation::ReverseWin(ReverseWinRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    amount: parse_amount("amount", &amount, AmountRule::Positive)?,
                    win_transaction_id,
                })
            }
            RequestKind::RollbackRollback => {
                let context = SessionContext::read(&mut fields, true);
                let game_id = fields.required("gameid");
                let round_id = fields.required("roundid");
                let transaction_id = fields.required("transactionid");
                let rollback_amount = fields
                    .optional("rollbackamount")
                    .or_else(|| fields.optional("rollbackAmount"));
                fields.finish()?;
                Operation::RollbackRollback(RollbackRollbackRequest {
                    context: SessionContext::build(context)?,
                    game_id,
                    round_id,
                    transaction_id,
                    rollback_amount: rollback_amount
                        .as_deref()
                        .map(|raw| parse_amount("rollbackamount", raw, AmountRule::Positive))
                        .transpose()?,
                })
            }
            RequestKind::WagerByBatch => {
                let body = body.ok_or_else(|| ProtocolError::MalformedBody("missing JSON body".to_string()))?;
                let api_version = fields
                    .optional("apiversion")
                    .unwrap_or_else(|| default_api_version.to_string());
                Operation::WagerByBatch(BatchWagerRequest::from_body(body, api_version, max_batch_bets)?)
            }
        };

        Ok(operation)
    }
}
