//! LMDB storage backend for the SACCO governance engine.
//!
//! Implements every storage trait from `sacco-store` on [`LmdbEnvironment`]
//! using the `heed` LMDB bindings. Records are `bincode`-encoded; each
//! logical table maps to one primary database plus prefix-scannable index
//! databases within a single environment.

pub mod chain;
pub mod contribution;
pub mod environment;
pub mod error;
pub mod group;
pub mod integrity;
mod keys;
pub mod loan;
pub mod membership;
pub mod outbox;
pub mod vote;

pub use environment::{LmdbEnvironment, CURRENT_SCHEMA_VERSION};
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
