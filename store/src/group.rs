//! Group storage trait.

use crate::StoreError;
use sacco_types::{BasisPoints, GroupId, GroupStatus, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A stored cooperative group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    /// The admin is the group's first approved member.
    pub admin_id: UserId,
    pub status: GroupStatus,
    /// Denormalized count of approved members. The membership store updates
    /// it in the same atomic step as each admission.
    pub member_count: u32,
    /// Share of approved members whose approve vote admits a new member.
    pub approval_threshold: BasisPoints,
    pub created_at: Timestamp,
}

pub trait GroupStore {
    fn insert_group(&self, group: &GroupRecord) -> Result<(), StoreError>;

    fn get_group(&self, id: &GroupId) -> Result<GroupRecord, StoreError>;

    /// All groups in insertion order.
    fn list_groups(&self) -> Result<Vec<GroupRecord>, StoreError>;
}
