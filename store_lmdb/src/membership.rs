//! LMDB implementation of MembershipStore.
//!
//! `membership_keys` maps `group ++ user` to the membership id and is the
//! uniqueness constraint. The conditional insert and the approval both read
//! the approved count and write inside one write transaction, which also
//! carries the group's updated `member_count`.

use heed::RoTxn;

use sacco_store::{
    Approval, ApprovalOutcome, InsertOutcome, MembershipRecord, MembershipStore, StoreError,
};
use sacco_types::{GroupId, MembershipId, MembershipStatus, UserId};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::{concat, membership_id_from, membership_key, seq_bytes, user_bytes};
use crate::LmdbError;

impl LmdbEnvironment {
    fn membership_by_id(
        &self,
        txn: &RoTxn<'_>,
        id: &[u8],
    ) -> Result<Option<MembershipRecord>, LmdbError> {
        match self.memberships_db.get(txn, id)? {
            Some(val) => Ok(Some(decode(val)?)),
            None => Ok(None),
        }
    }

    /// Resolve every id in an index prefix to its membership row.
    fn memberships_under(
        &self,
        txn: &RoTxn<'_>,
        index: &heed::Database<heed::types::Bytes, heed::types::Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<MembershipRecord>, LmdbError> {
        let mut out = Vec::new();
        for result in index.prefix_iter(txn, prefix)? {
            let (_key, id) = result?;
            let record = self.membership_by_id(txn, id)?.ok_or_else(|| {
                LmdbError::NotFound(format!(
                    "membership {} referenced by index",
                    membership_id_from(id).map(|m| m.to_string()).unwrap_or_default()
                ))
            })?;
            out.push(record);
        }
        Ok(out)
    }

    fn approved_in(&self, txn: &RoTxn<'_>, group: &GroupId) -> Result<u32, LmdbError> {
        let count = self
            .memberships_under(txn, &self.group_members_db, group.as_uuid().as_bytes())?
            .iter()
            .filter(|m| m.status == MembershipStatus::Approved)
            .count();
        Ok(count as u32)
    }
}

impl MembershipStore for LmdbEnvironment {
    fn insert_membership(
        &self,
        record: &MembershipRecord,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        let unique = membership_key(&record.group_id, &record.user_id)?;
        let id = record.id.as_uuid().as_bytes();
        let bytes = encode(record)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .membership_keys_db
            .get(&wtxn, &unique)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(InsertOutcome::Duplicate);
        }
        let approved = self.approved_in(&wtxn, &record.group_id)?;
        if approved >= capacity {
            return Ok(InsertOutcome::Full { approved });
        }

        let seq = seq_bytes(self.next_seq(&mut wtxn)?);
        let group_index = concat(&[record.group_id.as_uuid().as_bytes(), &seq]);
        let user_index = concat(&[&user_bytes(&record.user_id)?, &seq]);
        self.memberships_db
            .put(&mut wtxn, id, &bytes)
            .map_err(LmdbError::from)?;
        self.membership_keys_db
            .put(&mut wtxn, &unique, id)
            .map_err(LmdbError::from)?;
        self.group_members_db
            .put(&mut wtxn, &group_index, id)
            .map_err(LmdbError::from)?;
        self.user_members_db
            .put(&mut wtxn, &user_index, id)
            .map_err(LmdbError::from)?;
        if record.status.is_approved() {
            self.write_member_count(&mut wtxn, &record.group_id, approved + 1)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(InsertOutcome::Inserted)
    }

    fn get_membership(&self, id: &MembershipId) -> Result<MembershipRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        self.membership_by_id(&rtxn, id.as_uuid().as_bytes())?
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))
    }

    fn find_membership(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        let unique = membership_key(group, user)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(id) = self
            .membership_keys_db
            .get(&rtxn, &unique)
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        Ok(self.membership_by_id(&rtxn, id)?)
    }

    fn list_memberships(
        &self,
        group: &GroupId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows =
            self.memberships_under(&rtxn, &self.group_members_db, group.as_uuid().as_bytes())?;
        if let Some(status) = status {
            rows.retain(|m| m.status == status);
        }
        Ok(rows)
    }

    fn list_user_memberships(&self, user: &UserId) -> Result<Vec<MembershipRecord>, StoreError> {
        let prefix = user_bytes(user)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.memberships_under(&rtxn, &self.user_members_db, &prefix)?)
    }

    fn count_memberships(
        &self,
        group: &GroupId,
        status: MembershipStatus,
    ) -> Result<u32, StoreError> {
        Ok(self.list_memberships(group, Some(status))?.len() as u32)
    }

    fn approve_membership(
        &self,
        id: &MembershipId,
        approval: Approval,
        capacity: u32,
    ) -> Result<ApprovalOutcome, StoreError> {
        let key = id.as_uuid().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut record = self
            .membership_by_id(&wtxn, key)?
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))?;
        if record.status.is_approved() {
            return Ok(ApprovalOutcome::AlreadyApproved(record));
        }
        let approved = self.approved_in(&wtxn, &record.group_id)?;
        if approved >= capacity {
            return Ok(ApprovalOutcome::Full { approved });
        }

        record.status = MembershipStatus::Approved;
        record.approval_date = Some(approval.at);
        record.approved_by_count = approval.approved_by_count;
        let bytes = encode(&record)?;
        self.memberships_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        self.write_member_count(&mut wtxn, &record.group_id, approved + 1)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(ApprovalOutcome::Approved(record))
    }

    fn set_show_profile(
        &self,
        id: &MembershipId,
        show_profile: bool,
    ) -> Result<MembershipRecord, StoreError> {
        let key = id.as_uuid().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut record = self
            .membership_by_id(&wtxn, key)?
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))?;
        record.show_profile = show_profile;
        let bytes = encode(&record)?;
        self.memberships_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }
}
