//! Membership storage trait.
//!
//! Memberships are keyed by id and uniquely indexed by `(group, user)`.

use crate::StoreError;
use sacco_types::{Amount, GroupId, MembershipId, MembershipStatus, Role, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One user's standing in one group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: MembershipId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub status: MembershipStatus,
    pub role: Role,
    /// Interest credited to the member. Nothing in the engine accrues it yet.
    pub interest_earned: Amount,
    pub requested_at: Timestamp,
    pub approval_date: Option<Timestamp>,
    pub approved_by_count: u32,
    /// Whether other members may see this member's user id.
    pub show_profile: bool,
    /// Approved-member count when the join was requested.
    pub electorate_snapshot: Option<u32>,
}

/// Stamp applied by the pending -> approved transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Approval {
    pub at: Timestamp,
    pub approved_by_count: u32,
}

/// Result of the conditional membership insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row for the same `(group, user)` already exists.
    Duplicate,
    /// The group already holds `approved` members, at or over capacity.
    Full { approved: u32 },
}

/// Result of the pending -> approved transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// This call performed the transition.
    Approved(MembershipRecord),
    /// The row was approved earlier; nothing changed.
    AlreadyApproved(MembershipRecord),
    /// Approving would push the group over capacity; the row stays pending.
    Full { approved: u32 },
}

pub trait MembershipStore {
    /// Insert a membership unless its `(group, user)` key exists or the group
    /// already has `capacity` approved members. The checks and the write are
    /// one atomic step, which also bumps the group's `member_count` when the
    /// row is inserted approved.
    fn insert_membership(
        &self,
        record: &MembershipRecord,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError>;

    fn get_membership(&self, id: &MembershipId) -> Result<MembershipRecord, StoreError>;

    fn find_membership(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError>;

    /// Memberships of a group in insertion order, optionally filtered by status.
    fn list_memberships(
        &self,
        group: &GroupId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<MembershipRecord>, StoreError>;

    /// Every membership a user holds, across groups.
    fn list_user_memberships(&self, user: &UserId) -> Result<Vec<MembershipRecord>, StoreError>;

    fn count_memberships(
        &self,
        group: &GroupId,
        status: MembershipStatus,
    ) -> Result<u32, StoreError>;

    /// Move a pending membership to approved, at most once, and only while the
    /// group's approved count stays within `capacity`. The group's
    /// `member_count` moves in the same atomic step.
    fn approve_membership(
        &self,
        id: &MembershipId,
        approval: Approval,
        capacity: u32,
    ) -> Result<ApprovalOutcome, StoreError>;

    fn set_show_profile(
        &self,
        id: &MembershipId,
        show_profile: bool,
    ) -> Result<MembershipRecord, StoreError>;
}
