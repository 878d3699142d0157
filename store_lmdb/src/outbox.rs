//! LMDB implementation of OutboxStore.
//!
//! Key format: `seq` (u64 big-endian), so iteration order is enqueue order.
//! Delivered entries are deleted, so the table only holds the backlog.

use sacco_store::{AuditEvent, OutboxEntry, OutboxStore, StoreError};
use sacco_types::Timestamp;

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::seq_bytes;
use crate::LmdbError;

impl LmdbEnvironment {
    fn update_outbox(
        &self,
        seq: u64,
        f: impl FnOnce(&mut OutboxEntry),
    ) -> Result<(), StoreError> {
        let key = seq_bytes(seq);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut entry: OutboxEntry = match self.outbox_db.get(&wtxn, &key).map_err(LmdbError::from)? {
            Some(val) => decode(val)?,
            None => return Err(StoreError::NotFound(format!("outbox entry {seq}"))),
        };
        f(&mut entry);
        let bytes = encode(&entry)?;
        self.outbox_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl OutboxStore for LmdbEnvironment {
    fn append_outbox(&self, event: &AuditEvent, at: Timestamp) -> Result<u64, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = self.next_seq(&mut wtxn)?;
        let entry = OutboxEntry {
            seq,
            event: event.clone(),
            enqueued_at: at,
            attempts: 0,
            last_error: None,
        };
        let bytes = encode(&entry)?;
        self.outbox_db
            .put(&mut wtxn, &seq_bytes(seq), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(seq)
    }

    fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut pending = Vec::new();
        for result in self
            .outbox_db
            .iter(&rtxn)
            .map_err(LmdbError::from)?
            .take(limit)
        {
            let (_key, val) = result.map_err(LmdbError::from)?;
            pending.push(decode(val)?);
        }
        Ok(pending)
    }

    fn mark_outbox_delivered(&self, seq: u64) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let removed = self
            .outbox_db
            .delete(&mut wtxn, &seq_bytes(seq))
            .map_err(LmdbError::from)?;
        if !removed {
            return Err(StoreError::NotFound(format!("outbox entry {seq}")));
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn outbox_len(&self) -> Result<usize, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let len = self.outbox_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(len as usize)
    }

    fn record_outbox_failure(&self, seq: u64, error: &str) -> Result<(), StoreError> {
        self.update_outbox(seq, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
        })
    }
}
