//! The single entry point callers use.
//!
//! Each operation validates and writes through the component that owns the
//! rows, then hands the matching audit event to the dispatcher. The audit
//! step runs after the write has succeeded and its outcome never reaches the
//! caller.

use crate::chain::{ChainStats, ChainedAuditLog, FinancialAnalytics, VerifiedRecord, VotingAnalytics};
use crate::config::EngineConfig;
use crate::dispatch::AuditDispatcher;
use crate::ledger::ContributionLedger;
use crate::loan::{active_loan_balance, LoanEngine, LoanTerms};
use crate::membership::{MembershipManager, NewGroup};
use crate::views::{
    DashboardStats, GroupView, LoanView, MemberDashboard, MemberSummary, MemberView, MyGroup,
    VoteOutcome,
};
use crate::SaccoError;
use sacco_store::{
    AuditEvent, AuditSink, ChainRecord, ContributionRecord, GroupRecord, MembershipRecord,
    SaccoStore,
};
use sacco_types::{
    Amount, Clock, GovernanceParams, GroupId, LoanId, MembershipId, SystemClock, Timestamp, UserId,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const VOTE_APPROVED_NOTE: &str = "Member approved";
const VOTE_REJECTED_NOTE: &str = "Member rejected";

/// Display label for a joining member that does not reveal their full id.
fn join_label(user: &UserId) -> String {
    let short: String = user.as_str().chars().take(8).collect();
    format!("Member #{short}")
}

pub struct GovernanceFacade<S, A> {
    store: Arc<S>,
    members: MembershipManager<S>,
    ledger: ContributionLedger<S>,
    loans: LoanEngine<S>,
    audit: AuditDispatcher<A>,
    chain: ChainedAuditLog<S>,
    clock: Arc<dyn Clock>,
    params: GovernanceParams,
}

impl<S, A> GovernanceFacade<S, A>
where
    S: SaccoStore,
    A: AuditSink,
{
    pub fn new(store: Arc<S>, sink: A, config: EngineConfig) -> Self {
        Self {
            members: MembershipManager::new(store.clone(), config.params.clone()),
            ledger: ContributionLedger::new(store.clone()),
            loans: LoanEngine::new(store.clone(), config.params.clone()),
            audit: AuditDispatcher::new(sink, config.audit_timeout()),
            chain: ChainedAuditLog::new(store.clone()),
            clock: Arc::new(SystemClock),
            params: config.params,
            store,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn audit_sink(&self) -> &A {
        self.audit.sink()
    }

    // ── Groups ───────────────────────────────────────────────────────────

    pub async fn create_group(&self, input: NewGroup) -> Result<GroupView, SaccoError> {
        let now = self.clock.now();
        let (group, admin) = self.members.create_group(input, now)?;
        self.audit
            .emit(AuditEvent::member_join(
                group.id,
                admin.user_id.clone(),
                join_label(&admin.user_id),
                join_meta(now),
                now,
            ))
            .await;
        self.group_view(group)
    }

    /// Active groups, newest first.
    pub fn list_groups(&self) -> Result<Vec<GroupView>, SaccoError> {
        self.members
            .active_groups()?
            .into_iter()
            .map(|g| self.group_view(g))
            .collect()
    }

    pub fn get_group(&self, group: &GroupId) -> Result<GroupView, SaccoError> {
        let record = self.members.group(group)?;
        self.group_view(record)
    }

    /// Groups in which `user` is an approved member.
    pub fn list_my_groups(&self, user: &UserId) -> Result<Vec<MyGroup>, SaccoError> {
        self.members
            .groups_of(user)?
            .into_iter()
            .map(|(group, membership)| {
                Ok(MyGroup {
                    group: self.group_view(group)?,
                    membership,
                })
            })
            .collect()
    }

    // ── Membership ───────────────────────────────────────────────────────

    pub async fn request_join(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<MembershipRecord, SaccoError> {
        let now = self.clock.now();
        let membership = self.members.request_join(group, user, now)?;
        self.audit
            .emit(AuditEvent::member_join(
                *group,
                user.clone(),
                join_label(user),
                join_meta(now),
                now,
            ))
            .await;
        Ok(membership)
    }

    pub async fn cast_vote(
        &self,
        group: &GroupId,
        target: &MembershipId,
        voter: &UserId,
        approve: bool,
    ) -> Result<VoteOutcome, SaccoError> {
        let now = self.clock.now();
        let outcome = self.members.cast_vote(group, target, voter, approve, now)?;
        let note = if approve {
            VOTE_APPROVED_NOTE
        } else {
            VOTE_REJECTED_NOTE
        };
        self.audit
            .emit(AuditEvent::vote(*group, *target, voter.clone(), approve, note, now))
            .await;
        Ok(outcome)
    }

    /// Pending join requests, oldest first. Admin only.
    pub fn list_pending(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<MembershipRecord>, SaccoError> {
        self.members.list_pending(group, requester)
    }

    /// Approved members with identities redacted per their privacy setting.
    pub fn list_approved_members(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<MemberSummary>, SaccoError> {
        self.members
            .list_approved(group, requester)?
            .iter()
            .map(|m| Ok(MemberSummary::redacted(m, self.ledger.balance(m)?)))
            .collect()
    }

    pub fn set_privacy(
        &self,
        group: &GroupId,
        user: &UserId,
        show_profile: bool,
    ) -> Result<MembershipRecord, SaccoError> {
        self.members.set_privacy(group, user, show_profile)
    }

    // ── Savings ──────────────────────────────────────────────────────────

    pub async fn record_contribution(
        &self,
        group: &GroupId,
        user: &UserId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<ContributionRecord, SaccoError> {
        let now = self.clock.now();
        let member = self.members.approved_membership(group, user)?;
        let record = self.ledger.record(&member, amount, description, now)?;
        self.audit
            .emit(AuditEvent::contribution(
                *group,
                user.clone(),
                amount,
                record.description.clone(),
                now,
            ))
            .await;
        Ok(record)
    }

    /// A member's contributions, newest first.
    pub fn list_contributions(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Vec<ContributionRecord>, SaccoError> {
        let member = self.members.membership(group, user)?;
        self.ledger.list(&member)
    }

    // ── Loans ────────────────────────────────────────────────────────────

    pub async fn request_loan(
        &self,
        group: &GroupId,
        user: &UserId,
        principal: Amount,
        terms: LoanTerms,
    ) -> Result<LoanView, SaccoError> {
        let now = self.clock.now();
        let member = self.members.approved_membership(group, user)?;
        let balance = self.ledger.balance(&member)?.current_balance;
        let loan = self.loans.request(&member, balance, principal, terms, now)?;
        self.audit
            .emit(AuditEvent::loan_approval(
                *group,
                user.clone(),
                principal,
                loan.id,
                now,
            ))
            .await;
        Ok(LoanView::new(loan, Amount::ZERO))
    }

    /// Append a repayment and return the loan's updated position.
    pub fn record_repayment(&self, loan: &LoanId, amount: Amount) -> Result<LoanView, SaccoError> {
        let now = self.clock.now();
        self.loans.repay(loan, amount, now)?;
        self.loans.view(self.loans.get(loan)?)
    }

    /// A member's loans, newest disbursement first.
    pub fn list_loans(&self, group: &GroupId, user: &UserId) -> Result<Vec<LoanView>, SaccoError> {
        let member = self.members.membership(group, user)?;
        self.loans.list(&member)
    }

    // ── Dashboard ────────────────────────────────────────────────────────

    pub fn get_member_dashboard(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<MemberDashboard, SaccoError> {
        let record = self.members.membership(group, user)?;
        let group = self.get_group(group)?;
        let balance = self.ledger.balance(&record)?;

        let mut recent_contributions = self.ledger.list(&record)?;
        recent_contributions.truncate(self.params.dashboard_recent_contributions);
        let loans = self.loans.list(&record)?;

        let stats = DashboardStats {
            total_contributed: balance.total_contributed,
            current_balance: balance.current_balance,
            interest_earned: record.interest_earned,
            active_loan_balance: active_loan_balance(&loans),
            group_pool_size: group.total_pool,
            member_count: group.record.member_count,
        };
        Ok(MemberDashboard {
            member: MemberView { record, balance },
            group,
            recent_contributions,
            loans,
            stats,
        })
    }

    // ── Audit trail ──────────────────────────────────────────────────────
    //
    // Read from the store's local chain, which the audit relay fills.

    /// The group's audit records with their verification, newest first.
    /// Approved members only.
    pub fn audit_trail(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<VerifiedRecord>, SaccoError> {
        self.members.require_member(group, requester)?;
        Ok(self.chain.trail(group)?)
    }

    /// Audit records about one member, newest first. Visible to that member
    /// and to the group admin.
    pub fn member_audit_history(
        &self,
        group: &GroupId,
        user: &UserId,
        requester: &UserId,
    ) -> Result<Vec<ChainRecord>, SaccoError> {
        let record = self.members.require_member(group, requester)?;
        if requester != user && &record.admin_id != requester {
            return Err(SaccoError::Unauthorized(
                "only the member or the group admin can view this history".into(),
            ));
        }
        Ok(self.chain.history(group, user)?)
    }

    pub fn audit_stats(&self, group: &GroupId, requester: &UserId) -> Result<ChainStats, SaccoError> {
        self.members.require_member(group, requester)?;
        Ok(self.chain.stats(group)?)
    }

    pub fn voting_analytics(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<VotingAnalytics, SaccoError> {
        self.members.require_member(group, requester)?;
        Ok(self.chain.voting(group)?)
    }

    pub fn financial_analytics(
        &self,
        group: &GroupId,
        requester: &UserId,
    ) -> Result<FinancialAnalytics, SaccoError> {
        self.members.require_member(group, requester)?;
        Ok(self.chain.financial(group)?)
    }

    fn group_view(&self, record: GroupRecord) -> Result<GroupView, SaccoError> {
        let contributed = self.ledger.group_total(&record.id)?;
        let book = self.loans.group_book(&record.id)?;
        let total_pool = contributed
            .saturating_add(book.repaid)
            .saturating_sub(book.disbursed);
        Ok(GroupView { record, total_pool })
    }
}

fn join_meta(now: Timestamp) -> BTreeMap<String, String> {
    BTreeMap::from([("timestamp".to_string(), now.to_rfc3339())])
}
