//! Loan and repayment storage trait.

use crate::StoreError;
use sacco_types::{Amount, BasisPoints, GroupId, LoanId, MembershipId, RepaymentId, Timestamp};
use serde::{Deserialize, Serialize};

/// A disbursed loan. Repayment progress is derived from [`RepaymentRecord`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub group_id: GroupId,
    pub membership_id: MembershipId,
    pub principal: Amount,
    pub interest_rate: BasisPoints,
    pub duration_months: u32,
    pub disbursed_at: Timestamp,
    pub due_date: Timestamp,
}

/// An immutable payment against a loan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRecord {
    pub id: RepaymentId,
    pub loan_id: LoanId,
    pub amount: Amount,
    pub payment_date: Timestamp,
}

pub trait LoanStore {
    fn insert_loan(&self, loan: &LoanRecord) -> Result<(), StoreError>;

    fn get_loan(&self, id: &LoanId) -> Result<LoanRecord, StoreError>;

    /// A member's loans in insertion order.
    fn list_member_loans(&self, membership: &MembershipId) -> Result<Vec<LoanRecord>, StoreError>;

    fn list_group_loans(&self, group: &GroupId) -> Result<Vec<LoanRecord>, StoreError>;

    fn append_repayment(&self, repayment: &RepaymentRecord) -> Result<(), StoreError>;

    /// Repayments against a loan in insertion order.
    fn list_repayments(&self, loan: &LoanId) -> Result<Vec<RepaymentRecord>, StoreError>;
}
