//! LMDB implementation of ChainStore.
//!
//! Key format: `seq` (u64 big-endian) in `chain`. The head hash of each kind
//! lives in `meta` under `chain_head:<kind>` and moves in the same write
//! transaction as the record it points at.

use heed::RoTxn;

use sacco_store::{AuditEvent, ChainAppend, ChainRecord, ChainStore, StoreError, GENESIS_HASH};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::seq_bytes;
use crate::LmdbError;

fn head_key(kind: &str) -> Vec<u8> {
    format!("chain_head:{kind}").into_bytes()
}

impl LmdbEnvironment {
    fn head_in(&self, txn: &RoTxn<'_>, kind: &str) -> Result<String, LmdbError> {
        match self.meta_db.get(txn, &head_key(kind))? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|_| LmdbError::Serialization(format!("chain head for {kind} is not utf-8"))),
            None => Ok(GENESIS_HASH.to_string()),
        }
    }
}

impl ChainStore for LmdbEnvironment {
    fn chain_head(&self, kind: &str) -> Result<String, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.head_in(&rtxn, kind)?)
    }

    fn append_chain(
        &self,
        seq: Option<u64>,
        event: &AuditEvent,
        previous_hash: &str,
        record_hash: &str,
    ) -> Result<ChainAppend, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(seq) = seq {
            if let Some(val) = self
                .chain_db
                .get(&wtxn, &seq_bytes(seq))
                .map_err(LmdbError::from)?
            {
                return Ok(ChainAppend::Exists(decode(val)?));
            }
        }
        let kind = event.kind_name();
        if self.head_in(&wtxn, kind)? != previous_hash {
            return Ok(ChainAppend::Stale);
        }

        let seq = match seq {
            Some(seq) => seq,
            None => self.next_seq(&mut wtxn)?,
        };
        let record = ChainRecord {
            seq,
            event: event.clone(),
            record_hash: record_hash.to_string(),
            previous_hash: previous_hash.to_string(),
        };
        let bytes = encode(&record)?;
        self.chain_db
            .put(&mut wtxn, &seq_bytes(seq), &bytes)
            .map_err(LmdbError::from)?;
        self.meta_db
            .put(&mut wtxn, &head_key(kind), record_hash.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(ChainAppend::Appended(record))
    }

    fn list_chain(&self) -> Result<Vec<ChainRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for result in self.chain_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            records.push(decode(val)?);
        }
        Ok(records)
    }

    fn chain_len(&self) -> Result<usize, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let len = self.chain_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(len as usize)
    }
}
