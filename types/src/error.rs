//! Errors raised when constructing or parsing fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("basis points must be within 1..=10000, got {0}")]
    InvalidBasisPoints(u32),

    #[error("fraction must be within (0, 1], got {0}")]
    InvalidFraction(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("date arithmetic out of range")]
    DateOutOfRange,
}
