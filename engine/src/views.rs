//! Read models returned by the façade.
//!
//! Balances, pool sizes, and loan progress are derived from the append-only
//! ledgers on every read rather than stored alongside the rows they describe.

use sacco_store::{ContributionRecord, GroupRecord, LoanRecord, MembershipRecord};
use sacco_types::{Amount, LoanStatus, MembershipId, Role, Timestamp, UserId};
use serde::Serialize;

/// A member's savings position, summed from their contributions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub total_contributed: Amount,
    /// Withdrawals are not modelled, so this equals `total_contributed`.
    pub current_balance: Amount,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub record: MembershipRecord,
    #[serde(flatten)]
    pub balance: Balance,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub record: GroupRecord,
    /// Contributions plus repayments minus disbursed principal. Advisory only.
    pub total_pool: Amount,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoanView {
    #[serde(flatten)]
    pub record: LoanRecord,
    pub amount_repaid: Amount,
    pub status: LoanStatus,
}

impl LoanView {
    pub fn new(record: LoanRecord, amount_repaid: Amount) -> Self {
        let status = if amount_repaid >= record.principal {
            LoanStatus::Closed
        } else {
            LoanStatus::Active
        };
        Self {
            record,
            amount_repaid,
            status,
        }
    }

    /// Principal not yet covered by repayments.
    pub fn outstanding(&self) -> Amount {
        self.record.principal.saturating_sub(self.amount_repaid)
    }
}

/// An approved member as seen by fellow members.
///
/// `user_id` is withheld unless the subject opted into `show_profile`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberSummary {
    pub membership_id: MembershipId,
    pub user_id: Option<UserId>,
    pub role: Role,
    pub total_contributed: Amount,
    pub current_balance: Amount,
    pub interest_earned: Amount,
    pub show_profile: bool,
    pub requested_at: Timestamp,
    pub approval_date: Option<Timestamp>,
}

impl MemberSummary {
    pub fn redacted(record: &MembershipRecord, balance: Balance) -> Self {
        Self {
            membership_id: record.id,
            user_id: record.show_profile.then(|| record.user_id.clone()),
            role: record.role,
            total_contributed: balance.total_contributed,
            current_balance: balance.current_balance,
            interest_earned: record.interest_earned,
            show_profile: record.show_profile,
            requested_at: record.requested_at,
            approval_date: record.approval_date,
        }
    }
}

/// Result of casting a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoteOutcome {
    Approved { approve_count: u32 },
    Pending { required: u32, approve_count: u32 },
}

impl VoteOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_contributed: Amount,
    pub current_balance: Amount,
    pub interest_earned: Amount,
    pub active_loan_balance: Amount,
    pub group_pool_size: Amount,
    pub member_count: u32,
}

/// Everything a member's home screen needs in one read.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberDashboard {
    pub member: MemberView,
    pub group: GroupView,
    pub recent_contributions: Vec<ContributionRecord>,
    pub loans: Vec<LoanView>,
    pub stats: DashboardStats,
}

/// A group the user belongs to, with their membership in it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MyGroup {
    pub group: GroupView,
    pub membership: MembershipRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_types::{BasisPoints, GroupId, LoanId, MembershipStatus};

    fn loan(principal: u64) -> LoanRecord {
        LoanRecord {
            id: LoanId::generate(),
            group_id: GroupId::generate(),
            membership_id: MembershipId::generate(),
            principal: Amount::new(principal),
            interest_rate: BasisPoints::new(1_000).unwrap(),
            duration_months: 12,
            disbursed_at: Timestamp::new(0),
            due_date: Timestamp::new(1),
        }
    }

    #[test]
    fn loan_closes_when_principal_covered() {
        assert_eq!(LoanView::new(loan(1_000), Amount::new(999)).status, LoanStatus::Active);
        assert_eq!(LoanView::new(loan(1_000), Amount::new(1_000)).status, LoanStatus::Closed);
        let overpaid = LoanView::new(loan(1_000), Amount::new(1_500));
        assert_eq!(overpaid.status, LoanStatus::Closed);
        assert_eq!(overpaid.outstanding(), Amount::ZERO);
    }

    #[test]
    fn summary_hides_user_unless_opted_in() {
        let mut record = MembershipRecord {
            id: MembershipId::generate(),
            group_id: GroupId::generate(),
            user_id: UserId::new("carol"),
            status: MembershipStatus::Approved,
            role: Role::Member,
            interest_earned: Amount::ZERO,
            requested_at: Timestamp::new(1),
            approval_date: Some(Timestamp::new(2)),
            approved_by_count: 1,
            show_profile: false,
            electorate_snapshot: None,
        };
        assert_eq!(MemberSummary::redacted(&record, Balance::default()).user_id, None);
        record.show_profile = true;
        assert_eq!(
            MemberSummary::redacted(&record, Balance::default()).user_id,
            Some(UserId::new("carol"))
        );
    }

    #[test]
    fn vote_outcome_json_carries_status_tag() {
        let json = serde_json::to_value(VoteOutcome::Pending {
            required: 6,
            approve_count: 5,
        })
        .unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["required"], 6);
        assert_eq!(json["approve_count"], 5);
    }
}
