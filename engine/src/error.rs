//! # Engine Errors
//!
//! A single error type covers the whole engine. The recoverable variants are
//! caller mistakes (unknown unit, duplicate registration, bad amount, bad
//! config) and leave state untouched. [`TideError::InvariantViolation`] is
//! the exception: it means the engine caught itself about to break a ledger
//! invariant, aborted the epoch without committing anything, and needs an
//! operator to look at it.

use thiserror::Error;

/// Errors returned by the tide engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TideError {
    /// No unit is registered under this id.
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    /// A unit with this id is already registered.
    #[error("unit already registered: {0}")]
    DuplicateUnit(String),

    /// A deposit, withdrawal or balance update would overflow or drive a
    /// balance below zero.
    #[error("invalid amount{}: {reason}", unit_suffix(.unit))]
    InvalidAmount {
        /// The unit the amount was aimed at, `None` for the network pool.
        unit: Option<String>,
        /// What was wrong with it.
        reason: String,
    },

    /// A [`TideConfig`](crate::TideConfig) field is out of range.
    #[error("invalid tide configuration: {0}")]
    InvalidConfig(String),

    /// Applying an epoch would have broken a ledger invariant. Nothing was
    /// committed.
    #[error("invariant violation in epoch {epoch}: {detail}")]
    InvariantViolation {
        /// The epoch that was aborted.
        epoch: u64,
        /// Which invariant, and by how much.
        detail: String,
    },
}

impl TideError {
    /// Returns `true` for errors that indicate a defect in the engine rather
    /// than a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TideError::InvariantViolation { .. })
    }
}

fn unit_suffix(unit: &Option<String>) -> String {
    match unit {
        Some(id) => format!(" for unit {}", id),
        None => String::new(),
    }
}

/// Result alias used throughout the engine.
pub type TideResult<T> = Result<T, TideError>;
