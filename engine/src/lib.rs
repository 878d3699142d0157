//! Cooperative savings-and-credit governance engine.
//!
//! Members request to join a group and existing members admit them by
//! quorum vote. Approved members contribute savings, borrow against them
//! under a collateral rule, and repay. Every governance and financial action
//! is mirrored, best-effort, to an [`AuditSink`](sacco_store::AuditSink).
//!
//! [`GovernanceFacade`] is the entry point. The components behind it each
//! own one slice of the data:
//!
//! - [`MembershipManager`]: groups, join requests, votes, quorum
//! - [`ContributionLedger`]: savings and derived balances
//! - [`LoanEngine`]: loans and repayments
//!
//! Audit delivery lives in [`dispatch`] (direct, bounded), [`outbox`]
//! (durable queue plus relay), [`chain`] (persisted hash chain, trail and
//! analytics) and [`http`] (remote service).

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod facade;
pub mod http;
pub mod ledger;
pub mod loan;
pub mod membership;
pub mod outbox;
pub mod views;

pub use chain::{
    ChainStats, ChainedAuditLog, FinancialAnalytics, RecordVerification, VerifiedRecord,
    VotingAnalytics,
};
pub use config::EngineConfig;
pub use dispatch::AuditDispatcher;
pub use error::SaccoError;
pub use facade::GovernanceFacade;
pub use http::HttpAuditSink;
pub use ledger::ContributionLedger;
pub use loan::{LoanEngine, LoanTerms};
pub use membership::{required_approvals, MembershipManager, NewGroup};
pub use outbox::{AuditRelay, OutboxSink, RelayReport};
pub use sacco_store::ChainRecord;
pub use views::{
    Balance, DashboardStats, GroupView, LoanView, MemberDashboard, MemberSummary, MemberView,
    MyGroup, VoteOutcome,
};
