use sacco_store::StoreError;
use sacco_types::{Amount, GroupId, LoanId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaccoError {
    #[error("already a member or pending approval")]
    AlreadyMember,

    #[error("group has reached its maximum of {capacity} members")]
    GroupFull { capacity: u32 },

    #[error("member not found or not approved")]
    NotApprovedMember,

    #[error("minimum balance required: {minimum} (current balance {available})")]
    InsufficientBalance { minimum: Amount, available: Amount },

    #[error("member not found")]
    MemberNotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    #[error("loan {0} not found")]
    LoanNotFound(LoanId),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid loan terms: {0}")]
    InvalidTerms(String),

    #[error("invalid approval threshold: {0}")]
    InvalidThreshold(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Translate a store-level `NotFound` into the domain error for that lookup.
pub(crate) trait NotFoundExt<T> {
    fn or_missing(self, missing: impl FnOnce() -> SaccoError) -> Result<T, SaccoError>;
}

impl<T> NotFoundExt<T> for Result<T, StoreError> {
    fn or_missing(self, missing: impl FnOnce() -> SaccoError) -> Result<T, SaccoError> {
        self.map_err(|e| if e.is_not_found() { missing() } else { e.into() })
    }
}
