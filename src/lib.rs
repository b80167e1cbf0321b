//! Groove wallet - casino wallet endpoint for the Groove provider protocol
//!
//! The provider reports wagers, results, rollbacks and jackpots over signed
//! HTTP calls. This crate verifies those calls, applies each one exactly once
//! against the player's balance and answers in the provider's wire format.
//!
//! Layering, bottom up: `store` (balances and transaction records committed
//! atomically), `engine` (the per-operation state machine), `dispatcher`
//! (signature, discriminator, parsing) and `api` (axum).

pub mod api;
pub mod config;
pub mod currency;
pub mod directory;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod protocol;
pub mod signature;
pub mod store;

pub use config::WalletConfig;
pub use dispatcher::RequestDispatcher;
pub use engine::{EngineSettings, TransactionEngine};
pub use errors::{WalletError, WalletResult};
pub use protocol::{ProtocolCode, ProtocolError};
pub use signature::SignatureCodec;
