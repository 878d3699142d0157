//! Nullable store: thread-safe in-memory storage for testing.
//!
//! All tables live behind one mutex, so each trait method is atomic the same
//! way a single LMDB write transaction is.

use sacco_store::{
    Approval, ApprovalOutcome, AuditEvent, ChainAppend, ChainRecord, ChainStore,
    ContributionRecord, ContributionStore, GroupRecord, GroupStore, InsertOutcome, LoanRecord,
    LoanStore, MembershipRecord, MembershipStore, OutboxEntry, OutboxStore, RepaymentRecord,
    StoreError, VoteRecord, VoteStore, GENESIS_HASH,
};
use sacco_types::{GroupId, LoanId, MembershipId, MembershipStatus, Timestamp, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    groups: Vec<GroupRecord>,
    memberships: Vec<MembershipRecord>,
    votes: Vec<VoteRecord>,
    contributions: Vec<ContributionRecord>,
    loans: Vec<LoanRecord>,
    repayments: Vec<RepaymentRecord>,
    outbox: Vec<OutboxEntry>,
    chain: Vec<ChainRecord>,
    next_seq: u64,
}

impl Tables {
    fn approved_in(&self, group: &GroupId) -> u32 {
        self.memberships
            .iter()
            .filter(|m| &m.group_id == group && m.status.is_approved())
            .count() as u32
    }

    fn set_member_count(&mut self, group: &GroupId, member_count: u32) {
        if let Some(g) = self.groups.iter_mut().find(|g| &g.id == group) {
            g.member_count = member_count;
        }
    }
}

/// An in-memory implementation of every store trait.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`StoreError::Backend`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of vote rows held for a target.
    pub fn vote_rows(&self, target: &MembershipId) -> usize {
        self.tables
            .lock()
            .unwrap()
            .votes
            .iter()
            .filter(|v| &v.target == target)
            .count()
    }

    /// Edit a stored chain record in place, bypassing the link check.
    pub fn tamper_chain(&self, seq: u64, f: impl FnOnce(&mut ChainRecord)) {
        let mut t = self.tables.lock().unwrap();
        if let Some(record) = t.chain.iter_mut().find(|r| r.seq == seq) {
            f(record);
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store configured to fail".into()));
        }
        Ok(self.tables.lock().unwrap())
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore for NullStore {
    fn insert_group(&self, group: &GroupRecord) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.groups.iter().any(|g| g.id == group.id) {
            return Err(StoreError::Duplicate(group.id.to_string()));
        }
        t.groups.push(group.clone());
        Ok(())
    }

    fn get_group(&self, id: &GroupId) -> Result<GroupRecord, StoreError> {
        self.tables()?
            .groups
            .iter()
            .find(|g| &g.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("group {id}")))
    }

    fn list_groups(&self) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self.tables()?.groups.clone())
    }
}

impl MembershipStore for NullStore {
    fn insert_membership(
        &self,
        record: &MembershipRecord,
        capacity: u32,
    ) -> Result<InsertOutcome, StoreError> {
        let mut t = self.tables()?;
        if t
            .memberships
            .iter()
            .any(|m| m.group_id == record.group_id && m.user_id == record.user_id)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        let approved = t.approved_in(&record.group_id);
        if approved >= capacity {
            return Ok(InsertOutcome::Full { approved });
        }
        t.memberships.push(record.clone());
        if record.status.is_approved() {
            t.set_member_count(&record.group_id, approved + 1);
        }
        Ok(InsertOutcome::Inserted)
    }

    fn get_membership(&self, id: &MembershipId) -> Result<MembershipRecord, StoreError> {
        self.tables()?
            .memberships
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))
    }

    fn find_membership(
        &self,
        group: &GroupId,
        user: &UserId,
    ) -> Result<Option<MembershipRecord>, StoreError> {
        Ok(self
            .tables()?
            .memberships
            .iter()
            .find(|m| &m.group_id == group && &m.user_id == user)
            .cloned())
    }

    fn list_memberships(
        &self,
        group: &GroupId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(self
            .tables()?
            .memberships
            .iter()
            .filter(|m| &m.group_id == group && status.map_or(true, |s| m.status == s))
            .cloned()
            .collect())
    }

    fn list_user_memberships(&self, user: &UserId) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(self
            .tables()?
            .memberships
            .iter()
            .filter(|m| &m.user_id == user)
            .cloned()
            .collect())
    }

    fn count_memberships(
        &self,
        group: &GroupId,
        status: MembershipStatus,
    ) -> Result<u32, StoreError> {
        Ok(self
            .tables()?
            .memberships
            .iter()
            .filter(|m| &m.group_id == group && m.status == status)
            .count() as u32)
    }

    fn approve_membership(
        &self,
        id: &MembershipId,
        approval: Approval,
        capacity: u32,
    ) -> Result<ApprovalOutcome, StoreError> {
        let mut t = self.tables()?;
        let idx = t
            .memberships
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))?;
        if t.memberships[idx].status.is_approved() {
            return Ok(ApprovalOutcome::AlreadyApproved(t.memberships[idx].clone()));
        }
        let approved = t.approved_in(&t.memberships[idx].group_id);
        if approved >= capacity {
            return Ok(ApprovalOutcome::Full { approved });
        }
        let row = &mut t.memberships[idx];
        row.status = MembershipStatus::Approved;
        row.approval_date = Some(approval.at);
        row.approved_by_count = approval.approved_by_count;
        let row = row.clone();
        t.set_member_count(&row.group_id, approved + 1);
        Ok(ApprovalOutcome::Approved(row))
    }

    fn set_show_profile(
        &self,
        id: &MembershipId,
        show_profile: bool,
    ) -> Result<MembershipRecord, StoreError> {
        let mut t = self.tables()?;
        let row = t
            .memberships
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("membership {id}")))?;
        row.show_profile = show_profile;
        Ok(row.clone())
    }
}

impl VoteStore for NullStore {
    fn upsert_vote(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        match t
            .votes
            .iter_mut()
            .find(|v| v.target == vote.target && v.voter == vote.voter)
        {
            Some(existing) => *existing = vote.clone(),
            None => t.votes.push(vote.clone()),
        }
        Ok(())
    }

    fn list_votes(&self, target: &MembershipId) -> Result<Vec<VoteRecord>, StoreError> {
        Ok(self
            .tables()?
            .votes
            .iter()
            .filter(|v| &v.target == target)
            .cloned()
            .collect())
    }
}

impl ContributionStore for NullStore {
    fn append_contribution(&self, contribution: &ContributionRecord) -> Result<(), StoreError> {
        self.tables()?.contributions.push(contribution.clone());
        Ok(())
    }

    fn list_member_contributions(
        &self,
        membership: &MembershipId,
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        Ok(self
            .tables()?
            .contributions
            .iter()
            .filter(|c| &c.membership_id == membership)
            .cloned()
            .collect())
    }

    fn list_group_contributions(
        &self,
        group: &GroupId,
    ) -> Result<Vec<ContributionRecord>, StoreError> {
        Ok(self
            .tables()?
            .contributions
            .iter()
            .filter(|c| &c.group_id == group)
            .cloned()
            .collect())
    }
}

impl LoanStore for NullStore {
    fn insert_loan(&self, loan: &LoanRecord) -> Result<(), StoreError> {
        self.tables()?.loans.push(loan.clone());
        Ok(())
    }

    fn get_loan(&self, id: &LoanId) -> Result<LoanRecord, StoreError> {
        self.tables()?
            .loans
            .iter()
            .find(|l| &l.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("loan {id}")))
    }

    fn list_member_loans(&self, membership: &MembershipId) -> Result<Vec<LoanRecord>, StoreError> {
        Ok(self
            .tables()?
            .loans
            .iter()
            .filter(|l| &l.membership_id == membership)
            .cloned()
            .collect())
    }

    fn list_group_loans(&self, group: &GroupId) -> Result<Vec<LoanRecord>, StoreError> {
        Ok(self
            .tables()?
            .loans
            .iter()
            .filter(|l| &l.group_id == group)
            .cloned()
            .collect())
    }

    fn append_repayment(&self, repayment: &RepaymentRecord) -> Result<(), StoreError> {
        self.tables()?.repayments.push(repayment.clone());
        Ok(())
    }

    fn list_repayments(&self, loan: &LoanId) -> Result<Vec<RepaymentRecord>, StoreError> {
        Ok(self
            .tables()?
            .repayments
            .iter()
            .filter(|r| &r.loan_id == loan)
            .cloned()
            .collect())
    }
}

impl OutboxStore for NullStore {
    fn append_outbox(&self, event: &AuditEvent, at: Timestamp) -> Result<u64, StoreError> {
        let mut t = self.tables()?;
        t.next_seq += 1;
        let seq = t.next_seq;
        t.outbox.push(OutboxEntry {
            seq,
            event: event.clone(),
            enqueued_at: at,
            attempts: 0,
            last_error: None,
        });
        Ok(seq)
    }

    fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>, StoreError> {
        Ok(self
            .tables()?
            .outbox
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_outbox_delivered(&self, seq: u64) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let index = t
            .outbox
            .iter()
            .position(|e| e.seq == seq)
            .ok_or_else(|| StoreError::NotFound(format!("outbox entry {seq}")))?;
        t.outbox.remove(index);
        Ok(())
    }

    fn outbox_len(&self) -> Result<usize, StoreError> {
        Ok(self.tables()?.outbox.len())
    }

    fn record_outbox_failure(&self, seq: u64, error: &str) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let entry = t
            .outbox
            .iter_mut()
            .find(|e| e.seq == seq)
            .ok_or_else(|| StoreError::NotFound(format!("outbox entry {seq}")))?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        Ok(())
    }
}

impl ChainStore for NullStore {
    fn chain_head(&self, kind: &str) -> Result<String, StoreError> {
        Ok(self
            .tables()?
            .chain
            .iter()
            .rev()
            .find(|r| r.event.kind_name() == kind)
            .map(|r| r.record_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string()))
    }

    fn append_chain(
        &self,
        seq: Option<u64>,
        event: &AuditEvent,
        previous_hash: &str,
        record_hash: &str,
    ) -> Result<ChainAppend, StoreError> {
        let mut t = self.tables()?;
        if let Some(seq) = seq {
            if let Some(existing) = t.chain.iter().find(|r| r.seq == seq) {
                return Ok(ChainAppend::Exists(existing.clone()));
            }
        }
        let head = t
            .chain
            .iter()
            .rev()
            .find(|r| r.event.kind_name() == event.kind_name())
            .map_or(GENESIS_HASH, |r| r.record_hash.as_str());
        if head != previous_hash {
            return Ok(ChainAppend::Stale);
        }
        let seq = match seq {
            Some(seq) => seq,
            None => {
                t.next_seq += 1;
                t.next_seq
            }
        };
        let record = ChainRecord {
            seq,
            event: event.clone(),
            record_hash: record_hash.to_string(),
            previous_hash: previous_hash.to_string(),
        };
        t.chain.push(record.clone());
        Ok(ChainAppend::Appended(record))
    }

    fn list_chain(&self) -> Result<Vec<ChainRecord>, StoreError> {
        Ok(self.tables()?.chain.clone())
    }

    fn chain_len(&self) -> Result<usize, StoreError> {
        Ok(self.tables()?.chain.len())
    }
}
