//! Membership lifecycle: join requests, quorum voting, and member listings.
//!
//! A membership moves `pending -> approved` exactly once. Quorum is recounted
//! from the vote rows on every vote instead of being kept as a running tally;
//! groups are capped at a few dozen members, so a full recount is cheap and
//! cannot drift from the rows it summarises.
//!
//! Neither the check-then-insert of a join nor the tally-then-approve of a vote
//! is covered by a cross-table transaction. The store's conditional primitives
//! close both windows: `insert_membership` enforces the `(group, user)` key and
//! the capacity atomically, and `approve_membership` performs the transition
//! at most once.

use crate::error::NotFoundExt;
use crate::views::VoteOutcome;
use crate::SaccoError;
use sacco_store::{
    Approval, ApprovalOutcome, GroupRecord, GroupStore, InsertOutcome, MembershipRecord,
    MembershipStore, VoteRecord, VoteStore,
};
use sacco_types::{
    Amount, BasisPoints, GovernanceParams, GroupId, GroupStatus, MembershipId, MembershipStatus,
    QuorumBasis, Role, Timestamp, UserId,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Approvals needed to admit a member: `ceil(electorate × threshold)`, never below one.
pub fn required_approvals(electorate: u32, threshold: BasisPoints) -> u32 {
    threshold.ceil_of(electorate).max(1)
}

/// Input for forming a new group.
#[derive(Clone, Debug)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub admin: UserId,
    /// Fraction in `(0, 1]`; the configured default applies when absent.
    pub approval_threshold: Option<f64>,
}

pub struct MembershipManager<S> {
    store: Arc<S>,
    params: GovernanceParams,
}

impl<S> MembershipManager<S>
where
    S: GroupStore + MembershipStore + VoteStore,
{
    pub fn new(store: Arc<S>, params: GovernanceParams) -> Self {
        Self { store, params }
    }

    pub fn group(&self, group: &GroupId) -> Result<GroupRecord, SaccoError> {
        self.store
            .get_group(group)
            .or_missing(|| SaccoError::GroupNotFound(*group))
    }

    /// Form a group; its admin becomes the first approved member.
    pub fn create_group(
        &self,
        input: NewGroup,
        now: Timestamp,
    ) -> Result<(GroupRecord, MembershipRecord), SaccoError> {
        let approval_threshold = match input.approval_threshold {
            Some(fraction) => BasisPoints::from_fraction(fraction)
                .map_err(|e| SaccoError::InvalidThreshold(e.to_string()))?,
            None => self.params.default_approval_threshold_bps,
        };

        let group = GroupRecord {
            id: GroupId::generate(),
            name: input.name,
            description: input.description,
            admin_id: input.admin.clone(),
            status: GroupStatus::Active,
            member_count: 0,
            approval_threshold,
            created_at: now,
        };
        self.store.insert_group(&group)?;

        let admin = MembershipRecord {
            id: MembershipId::generate(),
            group_id: group.id,
            user_id: input.admin,
            status: MembershipStatus::Approved,
            role: Role::Admin,
            interest_earned: Amount::ZERO,
            requested_at: now,
            approval_date: Some(now),
            approved_by_count: 0,
            show_profile: false,
            electorate_snapshot: None,
        };
        match self.store.insert_membership(&admin, self.params.max_members)? {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate => return Err(SaccoError::AlreadyMember),
            InsertOutcome::Full { .. } => {
                return Err(SaccoError::GroupFull {
                    capacity: self.params.max_members,
                })
            }
        }
        let group = self.store.get_group(&group.id)?;

        info!(group = %group.id, admin = %admin.user_id, threshold = %approval_threshold, "group created");
        Ok((group, admin))
    }

    /// Create a pending membership for `user`.
    pub fn request_join(
        &self,
        group: &GroupId,
        user: &UserId,
        now: Timestamp,
    ) -> Result<MembershipRecord, SaccoError> {
        let record = self.group(group)?;
        if record.status != GroupStatus::Active {
            return Err(SaccoError::Unauthorized("group is not active".into()));
        }

        // Cheap pre-checks for a precise error; the conditional insert below
        // is what actually holds the invariants under concurrency.
        if self.store.find_membership(group, user)?.is_some() {
            return Err(SaccoError::AlreadyMember);
        }
        let approved = self
            .store
            .count_memberships(group, MembershipStatus::Approved)?;
        let capacity = self.params.max_members;
        if approved >= capacity {
            return Err(SaccoError::GroupFull { capacity });
        }

        let membership = MembershipRecord {
            id: MembershipId::generate(),
            group_id: *group,
            user_id: user.clone(),
            status: MembershipStatus::Pending,
            role: Role::Member,
            interest_earned: Amount::ZERO,
            requested_at: now,
            approval_date: None,
            approved_by_count: 0,
            show_profile: false,
            electorate_snapshot: match self.params.quorum_basis {
                QuorumBasis::Snapshot => Some(approved),
                QuorumBasis::Live => None,
            },
        };
        match self.store.insert_membership(&membership, capacity)? {
            InsertOutcome::Inserted => {
                info!(group = %group, user = %user, membership = %membership.id, "join requested");
                Ok(membership)
            }
            InsertOutcome::Duplicate => Err(SaccoError::AlreadyMember),
            InsertOutcome::Full { .. } => Err(SaccoError::GroupFull { capacity }),
        }
    }

    /// Record `voter`'s position on `target` and re-tally its quorum.
    pub fn cast_vote(
        &self,
        group: &GroupId,
        target: &MembershipId,
        voter: &UserId,
        approve: bool,
        now: Timestamp,
    ) -> Result<VoteOutcome, SaccoError> {
        let group_record = self.group(group)?;
        let candidate = self
            .store
            .get_membership(target)
            .or_missing(|| SaccoError::MemberNotFound)?;
        if &candidate.group_id != group {
            return Err(SaccoError::MemberNotFound);
        }
        match self.store.find_membership(group, voter)? {
            Some(m) if m.status.is_approved() => {}
            _ => {
                return Err(SaccoError::Unauthorized(
                    "only approved members may vote".into(),
                ))
            }
        }

        // The vote must be durable before this request reads the tally.
        self.store.upsert_vote(&VoteRecord {
            group_id: *group,
            target: *target,
            voter: voter.clone(),
            approve,
            cast_at: now,
        })?;

        let approve_count = self
            .store
            .list_votes(target)?
            .iter()
            .filter(|v| v.approve)
            .count() as u32;

        if candidate.status.is_approved() {
            return Ok(VoteOutcome::Approved { approve_count });
        }

        let electorate = match candidate.electorate_snapshot {
            Some(snapshot) => snapshot,
            None => self
                .store
                .count_memberships(group, MembershipStatus::Approved)?,
        };
        let required = required_approvals(electorate, group_record.approval_threshold);
        debug!(
            group = %group,
            target = %target,
            approve_count,
            required,
            electorate,
            "quorum recount"
        );

        if approve_count < required {
            return Ok(VoteOutcome::Pending {
                required,
                approve_count,
            });
        }

        let approval = Approval {
            at: now,
            approved_by_count: approve_count,
        };
        match self
            .store
            .approve_membership(target, approval, self.params.max_members)?
        {
            ApprovalOutcome::Approved(row) => {
                info!(
                    group = %group,
                    member = %row.user_id,
                    approve_count,
                    "member approved"
                );
                Ok(VoteOutcome::Approved { approve_count })
            }
            ApprovalOutcome::AlreadyApproved(_) => Ok(VoteOutcome::Approved { approve_count }),
            ApprovalOutcome::Full { approved } => {
                warn!(
                    group = %group,
                    target = %target,
                    approved,
                    "quorum reached but group is at capacity; request stays pending"
                );
                Ok(VoteOutcome::Pending {
                    required,
                    approve_count,
                })
            }
        }
    }

    /// Pending requests, oldest first. Admin only.
    pub fn list_pending(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<MembershipRecord>, SaccoError> {
        let record = self.group(group)?;
        if &record.admin_id != requester {
            return Err(SaccoError::Unauthorized(
                "only the group admin can view pending members".into(),
            ));
        }
        let mut pending = self
            .store
            .list_memberships(group, Some(MembershipStatus::Pending))?;
        pending.sort_by_key(|m| m.requested_at);
        Ok(pending)
    }

    /// Approved memberships. Approved members only.
    ///
    /// Rows are returned unredacted; callers present them through
    /// [`MemberSummary::redacted`](crate::MemberSummary::redacted).
    pub fn list_approved(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<MembershipRecord>, SaccoError> {
        self.require_member(group, requester)?;
        Ok(self
            .store
            .list_memberships(group, Some(MembershipStatus::Approved))?)
    }

    /// Fail unless `requester` is an approved member of an existing group.
    pub fn require_member(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<GroupRecord, SaccoError> {
        let record = self.group(group)?;
        match self.store.find_membership(group, requester)? {
            Some(m) if m.status.is_approved() => Ok(record),
            _ => Err(SaccoError::Unauthorized("not a member of this group".into())),
        }
    }

    /// The membership row for `(group, user)` in any status.
    pub fn membership(&self, group: &GroupId, user: &UserId) -> Result<MembershipRecord, SaccoError> {
        self.store
            .find_membership(group, user)?
            .ok_or(SaccoError::MemberNotFound)
    }

    /// The membership row for `(group, user)`, required to be approved.
    pub fn approved_membership(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<MembershipRecord, SaccoError> {
        match self.store.find_membership(group, user)? {
            Some(m) if m.status.is_approved() => Ok(m),
            _ => Err(SaccoError::NotApprovedMember),
        }
    }

    pub fn set_privacy(
        &self,
        group: &GroupId,
        user: &UserId,
        show_profile: bool,
    ) -> Result<MembershipRecord, SaccoError> {
        let membership = self.membership(group, user)?;
        let updated = self
            .store
            .set_show_profile(&membership.id, show_profile)
            .or_missing(|| SaccoError::MemberNotFound)?;
        debug!(group = %group, user = %user, show_profile, "privacy updated");
        Ok(updated)
    }

    /// Approved memberships a user holds, paired with their groups.
    pub fn groups_of(
        &self,
        user: &UserId,
    ) -> Result<Vec<(GroupRecord, MembershipRecord)>, SaccoError> {
        let mut out = Vec::new();
        for membership in self.store.list_user_memberships(user)? {
            if !membership.status.is_approved() {
                continue;
            }
            let group = self.group(&membership.group_id)?;
            out.push((group, membership));
        }
        Ok(out)
    }

    /// Active groups, newest first.
    pub fn active_groups(&self) -> Result<Vec<GroupRecord>, SaccoError> {
        let mut groups: Vec<GroupRecord> = self
            .store
            .list_groups()?
            .into_iter()
            .filter(|g| g.status == GroupStatus::Active)
            .collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bps(v: u32) -> BasisPoints {
        BasisPoints::new(v).unwrap()
    }

    #[test]
    fn sixty_percent_of_ten_needs_six() {
        assert_eq!(required_approvals(10, bps(6_000)), 6);
    }

    #[test]
    fn lone_admin_needs_one() {
        assert_eq!(required_approvals(1, bps(6_000)), 1);
    }

    #[test]
    fn empty_electorate_still_needs_one() {
        assert_eq!(required_approvals(0, bps(6_000)), 1);
    }

    #[test]
    fn unanimity() {
        assert_eq!(required_approvals(30, BasisPoints::FULL), 30);
    }

    proptest! {
        #[test]
        fn never_exceeds_electorate(electorate in 1u32..=30, threshold in 1u32..=10_000) {
            let required = required_approvals(electorate, bps(threshold));
            prop_assert!(required >= 1);
            prop_assert!(required <= electorate);
        }
    }
}
