//! Vote storage trait.

use crate::StoreError;
use sacco_types::{GroupId, MembershipId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One voter's current position on one pending membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub group_id: GroupId,
    pub target: MembershipId,
    pub voter: UserId,
    pub approve: bool,
    pub cast_at: Timestamp,
}

pub trait VoteStore {
    /// Insert or overwrite the vote keyed by `(target, voter)`.
    ///
    /// Must be durable before returning: the caller tallies immediately after.
    fn upsert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError>;

    /// All votes on a target, one per voter.
    fn list_votes(&self, target: &MembershipId) -> Result<Vec<VoteRecord>, StoreError>;
}
