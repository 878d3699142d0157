//! Loan engine: collateral-checked borrowing and repayment tracking.
//!
//! Loan progress is never stored. `amount_repaid` is summed from the
//! repayment stream on every read and a loan reads as closed once the sum
//! covers its principal.

use crate::error::NotFoundExt;
use crate::views::LoanView;
use crate::SaccoError;
use sacco_store::{LoanRecord, LoanStore, MembershipRecord, RepaymentRecord};
use sacco_types::{
    Amount, BasisPoints, GovernanceParams, GroupId, LoanId, LoanStatus, RepaymentId, Timestamp,
};
use std::sync::Arc;
use tracing::info;

/// Optional overrides for a loan request; unset fields take the configured defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoanTerms {
    pub interest_rate: Option<BasisPoints>,
    pub duration_months: Option<u32>,
}

/// Savings a member must hold to borrow `principal`.
pub fn collateral_minimum(principal: Amount, collateral: BasisPoints) -> Amount {
    principal.share_ceil(collateral)
}

/// Outstanding principal across the active loans in `loans`.
pub fn active_loan_balance(loans: &[LoanView]) -> Amount {
    loans
        .iter()
        .filter(|l| l.status == LoanStatus::Active)
        .map(LoanView::outstanding)
        .sum()
}

/// Money position of a group's loan book.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoanBook {
    pub disbursed: Amount,
    pub repaid: Amount,
}

pub struct LoanEngine<S> {
    store: Arc<S>,
    params: GovernanceParams,
}

impl<S: LoanStore> LoanEngine<S> {
    pub fn new(store: Arc<S>, params: GovernanceParams) -> Self {
        Self { store, params }
    }

    /// Disburse a loan to `member` if their balance covers the collateral share.
    pub fn request(
        &self,
        member: &MembershipRecord,
        balance: Amount,
        principal: Amount,
        terms: LoanTerms,
        now: Timestamp,
    ) -> Result<LoanRecord, SaccoError> {
        if !member.status.is_approved() {
            return Err(SaccoError::NotApprovedMember);
        }
        if principal.is_zero() {
            return Err(SaccoError::InvalidAmount("principal must be positive".into()));
        }
        let duration_months = terms
            .duration_months
            .unwrap_or(self.params.default_duration_months);
        if duration_months == 0 {
            return Err(SaccoError::InvalidTerms(
                "duration must be at least one month".into(),
            ));
        }

        let minimum = collateral_minimum(principal, self.params.collateral_bps);
        if balance < minimum {
            return Err(SaccoError::InsufficientBalance {
                minimum,
                available: balance,
            });
        }

        let due_date = now
            .add_calendar_months(duration_months)
            .map_err(|e| SaccoError::InvalidTerms(e.to_string()))?;
        let loan = LoanRecord {
            id: LoanId::generate(),
            group_id: member.group_id,
            membership_id: member.id,
            principal,
            interest_rate: terms
                .interest_rate
                .unwrap_or(self.params.default_interest_bps),
            duration_months,
            disbursed_at: now,
            due_date,
        };
        self.store.insert_loan(&loan)?;
        info!(
            group = %loan.group_id,
            member = %member.user_id,
            loan = %loan.id,
            principal = %principal,
            due = %due_date,
            "loan disbursed"
        );
        Ok(loan)
    }

    pub fn get(&self, loan: &LoanId) -> Result<LoanRecord, SaccoError> {
        self.store
            .get_loan(loan)
            .or_missing(|| SaccoError::LoanNotFound(*loan))
    }

    /// Append a repayment. Overpayment is accepted; the loan simply reads as closed.
    pub fn repay(
        &self,
        loan: &LoanId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<RepaymentRecord, SaccoError> {
        let record = self.get(loan)?;
        if amount.is_zero() {
            return Err(SaccoError::InvalidAmount("repayment must be positive".into()));
        }
        let repayment = RepaymentRecord {
            id: RepaymentId::generate(),
            loan_id: record.id,
            amount,
            payment_date: now,
        };
        self.store.append_repayment(&repayment)?;
        info!(loan = %loan, amount = %amount, "repayment recorded");
        Ok(repayment)
    }

    pub fn view(&self, loan: LoanRecord) -> Result<LoanView, SaccoError> {
        let repaid: Amount = self
            .store
            .list_repayments(&loan.id)?
            .iter()
            .map(|r| r.amount)
            .sum();
        Ok(LoanView::new(loan, repaid))
    }

    /// A member's loans, newest disbursement first.
    pub fn list(&self, member: &MembershipRecord) -> Result<Vec<LoanView>, SaccoError> {
        let mut loans = self.store.list_member_loans(&member.id)?;
        loans.reverse();
        loans.sort_by(|a, b| b.disbursed_at.cmp(&a.disbursed_at));
        loans.into_iter().map(|l| self.view(l)).collect()
    }

    pub fn group_book(&self, group: &GroupId) -> Result<LoanBook, SaccoError> {
        let mut book = LoanBook::default();
        for loan in self.store.list_group_loans(group)? {
            book.disbursed = book.disbursed.saturating_add(loan.principal);
            let repaid: Amount = self
                .store
                .list_repayments(&loan.id)?
                .iter()
                .map(|r| r.amount)
                .sum();
            book.repaid = book.repaid.saturating_add(repaid);
        }
        Ok(book)
    }
}
