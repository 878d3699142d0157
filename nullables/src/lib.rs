//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the engine (clock, persistent store, audit
//! sink) is abstracted behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, make the sink fail or hang,
//!   make the store fail)
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod audit;
pub mod clock;
pub mod store;

pub use audit::{NullAuditSink, SinkMode};
pub use clock::NullClock;
pub use store::NullStore;
