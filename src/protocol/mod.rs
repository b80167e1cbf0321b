//! GrooveTech wire protocol
//!
//! Result codes, request parsing and response shapes. Business outcomes are
//! carried in the body as a [`ProtocolCode`] with HTTP 200; only malformed or
//! unauthenticated calls become a [`ProtocolError`] with a 4xx status.

pub mod request;
pub mod response;

pub use request::{
    BatchBet, BatchWagerRequest, GetAccountRequest, GetBalanceRequest, JackpotRequest, Operation,
    ProviderParams, RequestKind, ResultRequest, ReverseWinRequest, RollbackRequest, RollbackRollbackRequest,
    SessionContext, SignaturePolicy, WagerAndResultRequest, WagerRequest,
};
pub use response::{
    AccountResponse, BalanceResponse, BatchBetResult, BatchWagerResponse, JackpotResponse, ProviderResponse,
    ResultResponse, ReversalResponse, WagerAndResultResponse, WagerResponse,
};

use serde::Serialize;
use thiserror::Error;

/// Status string for an idempotent replay; the code stays 200
pub const DUPLICATE_STATUS: &str = "Success - duplicate request";

/// Protocol-level result codes carried in response bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolCode {
    Success,
    NotLoggedOn,
    OutOfMoney,
    OperationNotAllowed,
    WagerNotFound,
    TransactionExists,
    TechnicalError,
}

impl ProtocolCode {
    pub fn code(self) -> u16 {
        match self {
            ProtocolCode::Success => 200,
            ProtocolCode::NotLoggedOn => 1000,
            ProtocolCode::OutOfMoney => 1006,
            ProtocolCode::OperationNotAllowed => 110,
            ProtocolCode::WagerNotFound => 102,
            ProtocolCode::TransactionExists => 409,
            ProtocolCode::TechnicalError => 1,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            ProtocolCode::Success => "Success",
            ProtocolCode::NotLoggedOn => "Not logged on",
            ProtocolCode::OutOfMoney => "Out of money",
            ProtocolCode::OperationNotAllowed => "Operation not allowed",
            ProtocolCode::WagerNotFound => "Wager not found",
            ProtocolCode::TransactionExists => "Transaction ID exists",
            ProtocolCode::TechnicalError => "Technical error",
        }
    }
}

/// Requests rejected before reaching the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Missing X-Groove-Signature header")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Unknown request '{0}'")]
    UnknownRequest(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),
    #[error("Invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Body returned with a protocol error
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProtocolErrorBody {
    pub code: u16,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_requests: Option<Vec<&'static str>>,
}

impl ProtocolError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status line for this rejection
    pub fn http_status(&self) -> u16 {
        match self {
            ProtocolError::InvalidSignature => 401,
            _ => 400,
        }
    }

    /// Code placed in the body
    pub fn code(&self) -> u16 {
        match self {
            ProtocolError::MissingSignature | ProtocolError::InvalidSignature => 1001,
            ProtocolError::InvalidParameter { .. } => ProtocolCode::OperationNotAllowed.code(),
            _ => 400,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ProtocolError::MissingSignature | ProtocolError::InvalidSignature => "Invalid signature",
            ProtocolError::InvalidParameter { .. } => ProtocolCode::OperationNotAllowed.status(),
            _ => "Bad Request",
        }
    }

    pub fn body(&self) -> ProtocolErrorBody {
        let (message, valid_requests) = match self {
            ProtocolError::UnknownRequest(_) => (
                format!("{}. Valid requests: {}", self, RequestKind::valid_list()),
                Some(RequestKind::ALL.iter().map(|kind| kind.as_str()).collect()),
            ),
            _ => (self.to_string(), None),
        };
        ProtocolErrorBody {
            code: self.code(),
            status: self.status().to_string(),
            message,
            valid_requests,
        }
    }
}
