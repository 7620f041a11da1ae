//! Error types

use thiserror::Error;

/// Errors raised while decoding on-chain data or validating drop policies.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CoreError {
    /// A tracked event carried the wrong number of attributes
    #[error("bond event attribute count mismatch: expected {expected}, got {actual}")]
    AttributeCountMismatch { expected: usize, actual: usize },

    /// Address is not valid bech32 or has an unexpected payload length
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Amount is not a non-negative base-10 integer that fits in 256 bits
    #[error("amount format not right, amount: {0:?}")]
    InvalidAmount(String),

    /// Drop policy table entry is unusable
    #[error("invalid drop policy for denom {denom:?}: {reason}")]
    InvalidPolicy { denom: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;
