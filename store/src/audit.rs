//! Audit sink interface.
//!
//! The audit sink is an external, append-only recorder of governance and
//! financial events. It is asynchronous and not always available; callers
//! treat every write as best-effort.

use sacco_types::{Amount, GroupId, LoanId, MembershipId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("audit sink rejected the event: {0}")]
    Rejected(String),

    #[error("audit sink timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// A governance or financial event destined for the audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub group_id: GroupId,
    /// The acting user: the joiner, the voter, the contributor, or the borrower.
    pub user_id: UserId,
    pub at: Timestamp,
    pub kind: AuditEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    MemberJoin {
        label: String,
        meta: BTreeMap<String, String>,
    },
    Vote {
        target: MembershipId,
        approve: bool,
        note: String,
    },
    Contribution {
        amount: Amount,
        note: String,
    },
    LoanApproval {
        principal: Amount,
        loan_id: LoanId,
    },
}

impl AuditEvent {
    pub fn member_join(
        group_id: GroupId,
        user_id: UserId,
        label: impl Into<String>,
        meta: BTreeMap<String, String>,
        at: Timestamp,
    ) -> Self {
        Self {
            group_id,
            user_id,
            at,
            kind: AuditEventKind::MemberJoin {
                label: label.into(),
                meta,
            },
        }
    }

    pub fn vote(
        group_id: GroupId,
        target: MembershipId,
        voter: UserId,
        approve: bool,
        note: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            group_id,
            user_id: voter,
            at,
            kind: AuditEventKind::Vote {
                target,
                approve,
                note: note.into(),
            },
        }
    }

    pub fn contribution(
        group_id: GroupId,
        user_id: UserId,
        amount: Amount,
        note: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            group_id,
            user_id,
            at,
            kind: AuditEventKind::Contribution {
                amount,
                note: note.into(),
            },
        }
    }

    pub fn loan_approval(
        group_id: GroupId,
        user_id: UserId,
        principal: Amount,
        loan_id: LoanId,
        at: Timestamp,
    ) -> Self {
        Self {
            group_id,
            user_id,
            at,
            kind: AuditEventKind::LoanApproval { principal, loan_id },
        }
    }

    /// Stable name of the event kind, used to partition audit chains.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            AuditEventKind::MemberJoin { .. } => "member_join",
            AuditEventKind::Vote { .. } => "vote",
            AuditEventKind::Contribution { .. } => "contribution",
            AuditEventKind::LoanApproval { .. } => "loan_approval",
        }
    }
}

/// Append-only, best-effort recorder of [`AuditEvent`]s.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send;
}

impl<T: AuditSink> AuditSink for Arc<T> {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send {
        (**self).record(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        let group = GroupId::generate();
        let user = UserId::new("u-1");
        let at = Timestamp::new(1_700_000_000);
        let join = AuditEvent::member_join(group, user.clone(), "Member #abc", BTreeMap::new(), at);
        let vote = AuditEvent::vote(group, MembershipId::generate(), user.clone(), true, "", at);
        let contribution = AuditEvent::contribution(group, user.clone(), Amount::new(500), "", at);
        let loan = AuditEvent::loan_approval(group, user, Amount::new(1), LoanId::generate(), at);
        assert_eq!(join.kind_name(), "member_join");
        assert_eq!(vote.kind_name(), "vote");
        assert_eq!(contribution.kind_name(), "contribution");
        assert_eq!(loan.kind_name(), "loan_approval");
    }

    #[test]
    fn event_json_shape() {
        let event = AuditEvent::contribution(
            GroupId::generate(),
            UserId::new("u-7"),
            Amount::new(2_500),
            "monthly savings",
            Timestamp::new(10),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["user_id"], "u-7");
        assert_eq!(json["kind"]["contribution"]["amount"], 2_500);
        assert_eq!(json["kind"]["contribution"]["note"], "monthly savings");
    }
}
