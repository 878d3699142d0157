//! Contribution ledger: append-only savings records and derived balances.

use crate::views::Balance;
use crate::SaccoError;
use sacco_store::{ContributionRecord, ContributionStore, MembershipRecord};
use sacco_types::{Amount, ContributionId, GroupId, Timestamp};
use std::sync::Arc;
use tracing::info;

/// Note attached to a contribution recorded without a description.
pub const DEFAULT_CONTRIBUTION_NOTE: &str = "Contribution to group savings";

pub struct ContributionLedger<S> {
    store: Arc<S>,
}

impl<S: ContributionStore> ContributionLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append a contribution for an approved member.
    ///
    /// The caller resolves `member`; this only checks the status and amount.
    pub fn record(
        &self,
        member: &MembershipRecord,
        amount: Amount,
        description: Option<String>,
        now: Timestamp,
    ) -> Result<ContributionRecord, SaccoError> {
        if !member.status.is_approved() {
            return Err(SaccoError::NotApprovedMember);
        }
        if amount.is_zero() {
            return Err(SaccoError::InvalidAmount(
                "contribution must be positive".into(),
            ));
        }

        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTRIBUTION_NOTE.to_string());
        let record = ContributionRecord {
            id: ContributionId::generate(),
            group_id: member.group_id,
            membership_id: member.id,
            amount,
            description,
            contributed_at: now,
        };
        self.store.append_contribution(&record)?;
        info!(
            group = %member.group_id,
            member = %member.user_id,
            amount = %amount,
            "contribution recorded"
        );
        Ok(record)
    }

    /// A member's contributions, newest first.
    pub fn list(&self, member: &MembershipRecord) -> Result<Vec<ContributionRecord>, SaccoError> {
        let mut rows = self.store.list_member_contributions(&member.id)?;
        // Stable sort keeps later inserts ahead of earlier ones within a second.
        rows.reverse();
        rows.sort_by(|a, b| b.contributed_at.cmp(&a.contributed_at));
        Ok(rows)
    }

    pub fn balance(&self, member: &MembershipRecord) -> Result<Balance, SaccoError> {
        let total: Amount = self
            .store
            .list_member_contributions(&member.id)?
            .iter()
            .map(|c| c.amount)
            .sum();
        Ok(Balance {
            total_contributed: total,
            current_balance: total,
        })
    }

    /// Sum of every contribution in a group.
    pub fn group_total(&self, group: &GroupId) -> Result<Amount, SaccoError> {
        Ok(self
            .store
            .list_group_contributions(group)?
            .iter()
            .map(|c| c.amount)
            .sum())
    }
}
