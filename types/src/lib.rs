//! Fundamental types for the SACCO governance engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! record identifiers, fixed-point amounts, basis points, timestamps and clocks,
//! status enums, and the governance parameters that bound group behaviour.

pub mod amount;
pub mod error;
pub mod id;
pub mod params;
pub mod state;
pub mod time;

pub use amount::{Amount, BasisPoints};
pub use error::TypeError;
pub use id::{ContributionId, GroupId, LoanId, MembershipId, RepaymentId, UserId};
pub use params::{GovernanceParams, QuorumBasis};
pub use state::{GroupStatus, LoanStatus, MembershipStatus, Role};
pub use time::{Clock, SystemClock, Timestamp};
pub use uuid::Uuid;
