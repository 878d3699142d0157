//! Durable audit outbox.
//!
//! Events are appended locally and drained to the external audit sink by a
//! relay, so a sink outage delays the audit trail instead of losing it.

use crate::{AuditEvent, StoreError};
use sacco_types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Monotonic sequence number assigned by the store.
    pub seq: u64,
    pub event: AuditEvent,
    pub enqueued_at: Timestamp,
    pub attempts: u32,
    pub last_error: Option<String>,
}

pub trait OutboxStore {
    /// Append an event; returns its sequence number.
    fn append_outbox(&self, event: &AuditEvent, at: Timestamp) -> Result<u64, StoreError>;

    /// Up to `limit` entries, oldest first. Every stored entry is undelivered.
    fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError>;

    /// Remove a delivered entry from the outbox.
    fn mark_outbox_delivered(&self, seq: u64) -> Result<(), StoreError>;

    /// Number of entries still waiting for delivery.
    fn outbox_len(&self) -> Result<usize, StoreError>;

    fn record_outbox_failure(&self, seq: u64, error: &str) -> Result<(), StoreError>;
}
