//! Validation errors for the shared primitive types.

use thiserror::Error;

/// Rejection reasons for malformed identifiers and timestamps.
///
/// Constructors in this crate return these instead of panicking; the
/// storage core maps them into its own precondition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid uid '{value}': {reason}")]
    InvalidUid { value: String, reason: &'static str },

    #[error("invalid email: {reason}")]
    InvalidEmail { reason: &'static str },

    #[error("invalid record kind '{value}': {reason}")]
    InvalidKind { value: String, reason: &'static str },

    #[error("invalid state name: {reason}")]
    InvalidState { reason: &'static str },

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: &'static str },

    #[error("invalid dated record name '{value}': {reason}")]
    InvalidDatedName { value: String, reason: &'static str },
}
