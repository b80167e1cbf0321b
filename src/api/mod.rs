//! Provider HTTP surface
//!
//! `GET /groove` and `POST /groove` carry provider calls; `/health` and
//! `/metrics` serve operators.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{build_dispatcher, ApiServer};
