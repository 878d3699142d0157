//! LMDB implementation of VoteStore.
//!
//! Key format: `target ++ len(voter) ++ voter`. One key per (target, voter)
//! pair, so an upsert is a plain `put` and a revote overwrites in place.

use sacco_store::{StoreError, VoteRecord, VoteStore};
use sacco_types::MembershipId;

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::{concat, user_bytes};
use crate::LmdbError;

impl VoteStore for LmdbEnvironment {
    fn upsert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let key = concat(&[vote.target.as_uuid().as_bytes(), &user_bytes(&vote.voter)?]);
        let bytes = encode(vote)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.votes_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_votes(&self, target: &MembershipId) -> Result<Vec<VoteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut votes = Vec::new();
        for result in self
            .votes_db
            .prefix_iter(&rtxn, target.as_uuid().as_bytes())
            .map_err(LmdbError::from)?
        {
            let (_key, val) = result.map_err(LmdbError::from)?;
            votes.push(decode(val)?);
        }
        Ok(votes)
    }
}
