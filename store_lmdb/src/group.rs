//! LMDB implementation of GroupStore.

use heed::RwTxn;
use sacco_store::{GroupRecord, GroupStore, StoreError};
use sacco_types::GroupId;

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::seq_bytes;
use crate::LmdbError;

impl LmdbEnvironment {
    /// Rewrite a group's denormalized member count inside the caller's write
    /// transaction. Missing groups are left alone.
    pub(crate) fn write_member_count(
        &self,
        wtxn: &mut RwTxn<'_>,
        id: &GroupId,
        member_count: u32,
    ) -> Result<(), StoreError> {
        let key = id.as_uuid().as_bytes();
        let mut group: GroupRecord = match self.groups_db.get(wtxn, key).map_err(LmdbError::from)? {
            Some(val) => decode(val)?,
            None => return Ok(()),
        };
        group.member_count = member_count;
        let bytes = encode(&group)?;
        self.groups_db
            .put(wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }
}

impl GroupStore for LmdbEnvironment {
    fn insert_group(&self, group: &GroupRecord) -> Result<(), StoreError> {
        let key = group.id.as_uuid().as_bytes();
        let bytes = encode(group)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .groups_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("group {}", group.id)));
        }
        let seq = self.next_seq(&mut wtxn)?;
        self.groups_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        self.group_order_db
            .put(&mut wtxn, &seq_bytes(seq), key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_group(&self, id: &GroupId) -> Result<GroupRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .groups_db
            .get(&rtxn, id.as_uuid().as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("group {id}")))?;
        Ok(decode(val)?)
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut groups = Vec::new();
        for result in self.group_order_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_seq, id) = result.map_err(LmdbError::from)?;
            let val = self
                .groups_db
                .get(&rtxn, id)
                .map_err(LmdbError::from)?
                .ok_or_else(|| StoreError::Corruption("group order points at missing group".into()))?;
            groups.push(decode(val)?);
        }
        Ok(groups)
    }
}
