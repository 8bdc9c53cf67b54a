//! # Validation Errors
//!
//! Raised when free-form input (status strings, role names) crosses into the
//! typed domain and does not match any known value.

use thiserror::Error;

/// Rejected input at the typed-domain boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The string is not one of the thirteen lifecycle statuses.
    #[error("unknown device status: {0:?}")]
    UnknownStatus(String),

    /// The string is not a known actor role.
    #[error("unknown actor role: {0:?}")]
    UnknownRole(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidId {
        /// The rejected input.
        value: String,
        /// Parser message.
        reason: String,
    },
}
