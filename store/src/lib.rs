//! Abstract interfaces to the engine's two external collaborators.
//!
//! The persistent store is split into one trait per table. Every backend
//! (LMDB, in-memory for testing) implements all of them; the rest of the
//! codebase depends only on the traits. No cross-table transaction is
//! assumed: each trait method is atomic on its own, and the conditional
//! primitives ([`MembershipStore::insert_membership`],
//! [`MembershipStore::approve_membership`], [`VoteStore::upsert_vote`]) carry
//! the invariants that a prior read cannot.
//!
//! The audit sink is append-only, asynchronous, and allowed to fail. The
//! local copy of the audit trail lives in [`ChainStore`].

pub mod audit;
pub mod chain;
pub mod contribution;
pub mod error;
pub mod group;
pub mod loan;
pub mod membership;
pub mod outbox;
pub mod vote;

pub use audit::{AuditError, AuditEvent, AuditEventKind, AuditSink};
pub use chain::{ChainAppend, ChainRecord, ChainStore, GENESIS_HASH};
pub use contribution::{ContributionRecord, ContributionStore};
pub use error::StoreError;
pub use group::{GroupRecord, GroupStore};
pub use loan::{LoanRecord, LoanStore, RepaymentRecord};
pub use membership::{Approval, ApprovalOutcome, InsertOutcome, MembershipRecord, MembershipStore};
pub use outbox::{OutboxEntry, OutboxStore};
pub use vote::{VoteRecord, VoteStore};

/// Every table the engine touches, behind one bound.
pub trait SaccoStore:
    GroupStore
    + MembershipStore
    + VoteStore
    + ContributionStore
    + LoanStore
    + ChainStore
    + Send
    + Sync
{
}

impl<T> SaccoStore for T where
    T: GroupStore
        + MembershipStore
        + VoteStore
        + ContributionStore
        + LoanStore
        + ChainStore
        + Send
        + Sync
{
}
