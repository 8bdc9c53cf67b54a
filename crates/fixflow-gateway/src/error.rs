//! Errors returned by collaborator ports.

use thiserror::Error;

/// Failure reported by an external collaborator (store, gateway, sink).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The requested record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record ("device", "customer", ...).
        entity: &'static str,
        /// Identifier as displayed.
        id: String,
    },

    /// The collaborator could not be reached or failed internally.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        /// Which collaborator failed.
        service: &'static str,
        /// Description of the outage.
        reason: String,
    },

    /// The collaborator refused the request.
    #[error("{service} rejected request: {reason}")]
    Rejected {
        /// Which collaborator refused.
        service: &'static str,
        /// Why the request was refused.
        reason: String,
    },
}

impl GatewayError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
