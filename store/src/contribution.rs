//! Contribution storage trait.

use crate::StoreError;
use sacco_types::{Amount, ContributionId, GroupId, MembershipId, Timestamp};
use serde::{Deserialize, Serialize};

/// An immutable savings deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub id: ContributionId,
    pub group_id: GroupId,
    pub membership_id: MembershipId,
    pub amount: Amount,
    pub description: String,
    pub contributed_at: Timestamp,
}

/// Append-only contribution ledger.
pub trait ContributionStore {
    fn append_contribution(&self, contribution: &ContributionRecord) -> Result<(), StoreError>;

    /// A member's contributions in insertion order.
    fn list_member_contributions(
        &self,
        membership: &MembershipId,
    ) -> Result<Vec<ContributionRecord>, StoreError>;

    /// Every contribution in a group, in insertion order.
    fn list_group_contributions(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ContributionRecord>, StoreError>;
}
