//! Persisted hash-chained audit trail.
//!
//! Records are kept in sequence order. Each event kind forms its own chain:
//! a record's `previous_hash` is the `record_hash` of the newest earlier
//! record of the same kind, or [`GENESIS_HASH`] for the first one. The store
//! only enforces the link; computing hashes is the caller's job.

use crate::{AuditEvent, StoreError};
use serde::{Deserialize, Serialize};

/// `previous_hash` of the first record in every chain.
pub const GENESIS_HASH: &str = "0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub seq: u64,
    pub event: AuditEvent,
    pub record_hash: String,
    pub previous_hash: String,
}

/// Result of a conditional chain append.
#[derive(Clone, Debug, PartialEq)]
pub enum ChainAppend {
    Appended(ChainRecord),
    /// A record with the requested sequence number is already stored.
    Exists(ChainRecord),
    /// The kind's head moved since the caller read it; nothing was written.
    Stale,
}

pub trait ChainStore {
    /// Hash of the newest record of `kind`, or [`GENESIS_HASH`] when the
    /// chain is empty.
    fn chain_head(&self, kind: &str) -> Result<String, StoreError>;

    /// Append `event` if `previous_hash` is still the head of its kind.
    ///
    /// With `seq` given, the append is idempotent on that number. Without
    /// one, the store allocates the next sequence number.
    fn append_chain(
        &self,
        seq: Option<u64>,
        event: &AuditEvent,
        previous_hash: &str,
        record_hash: &str,
    ) -> Result<ChainAppend, StoreError>;

    /// Every record, oldest first.
    fn list_chain(&self) -> Result<Vec<ChainRecord>, StoreError>;

    fn chain_len(&self) -> Result<usize, StoreError>;
}
