//! Side-effect errors.
//!
//! None of these ever reach the caller of a transition: they are logged at
//! the handler boundary and, when retryable, retried by the publisher.

use thiserror::Error;

use fixflow_core::{CustomerId, TriggerId};
use fixflow_gateway::GatewayError;

/// Failure while dispatching one notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("template lookup failed for trigger {trigger}: {source}")]
    Template {
        trigger: TriggerId,
        #[source]
        source: GatewayError,
    },

    #[error("customer lookup failed for trigger {trigger}: {source}")]
    Customer {
        trigger: TriggerId,
        #[source]
        source: GatewayError,
    },

    #[error("messaging gateway failed for trigger {trigger}: {source}")]
    Gateway {
        trigger: TriggerId,
        #[source]
        source: GatewayError,
    },

    #[error("fixed notice '{notice}' failed: {source}")]
    Notice {
        notice: &'static str,
        #[source]
        source: GatewayError,
    },
}

/// Failure while crediting loyalty points.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoyaltyError {
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    #[error("customer store: {0}")]
    Customer(#[source] GatewayError),

    #[error("points ledger: {0}")]
    Ledger(#[source] GatewayError),
}

/// Error surfaced by an [`EffectHandler`](crate::EffectHandler).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("audit: {0}")]
    Audit(#[source] GatewayError),

    #[error("dispatch: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("loyalty: {0}")]
    Loyalty(#[from] LoyaltyError),
}

impl EffectError {
    /// Only transient audit failures are retried. Retrying loyalty or
    /// messaging could double-credit points or duplicate messages.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Audit(e) => e.is_transient(),
            Self::Dispatch(_) | Self::Loyalty(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_audit_errors_retry() {
        assert!(EffectError::Audit(GatewayError::unavailable("audit sink", "down")).retryable());
        assert!(!EffectError::Audit(GatewayError::not_found("entry", 1)).retryable());
        assert!(!EffectError::Loyalty(LoyaltyError::Ledger(GatewayError::unavailable(
            "points ledger",
            "down"
        )))
        .retryable());
    }
}
