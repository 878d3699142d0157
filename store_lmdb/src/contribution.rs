//! LMDB implementation of ContributionStore.
//!
//! Each contribution is written twice in one transaction: under
//! `membership ++ seq` and under `group ++ seq`. Rows are immutable, so the
//! copies cannot drift.

use sacco_store::{ContributionRecord, ContributionStore, StoreError};
use sacco_types::{GroupId, MembershipId};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::{concat, seq_bytes};
use crate::LmdbError;

impl LmdbEnvironment {
    fn contributions_under(
        &self,
        db: &heed::Database<heed::types::Bytes, heed::types::Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows = Vec::new();
        for result in db.prefix_iter(&rtxn, prefix).map_err(LmdbError::from)? {
            let (_key, val) = result.map_err(LmdbError::from)?;
            rows.push(decode(val)?);
        }
        Ok(rows)
    }
}

impl ContributionStore for LmdbEnvironment {
    fn append_contribution(&self, contribution: &ContributionRecord) -> Result<(), StoreError> {
        let bytes = encode(contribution)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = seq_bytes(self.next_seq(&mut wtxn)?);
        let by_member = concat(&[contribution.membership_id.as_uuid().as_bytes(), &seq]);
        let by_group = concat(&[contribution.group_id.as_uuid().as_bytes(), &seq]);
        self.member_contributions_db
            .put(&mut wtxn, &by_member, &bytes)
            .map_err(LmdbError::from)?;
        self.group_contributions_db
            .put(&mut wtxn, &by_group, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_member_contributions(
        &self,
        membership: &MembershipId,
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        self.contributions_under(&self.member_contributions_db, membership.as_uuid().as_bytes())
    }

    fn list_group_contributions(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        self.contributions_under(&self.group_contributions_db, group.as_uuid().as_bytes())
    }
}
