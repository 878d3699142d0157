//! HTTP API for the SACCO governance engine.
//!
//! Every endpoint is a `POST` under `/v1` taking a JSON body, plus a plain
//! `GET /health`. Amounts travel as decimal strings in requests (`"150.00"`)
//! and as integer minor units in responses.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer};
