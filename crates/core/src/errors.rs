use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::flows::{FlowTransitionError, GuardOutcome};
use crate::gateway::GatewayError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {from:?} to {to:?}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Blocking precondition failures. These never reach a mutating
    /// collaborator; the guard list is surfaced to the user as-is.
    #[error("validation failed: {0}")]
    Validation(GuardOutcome),
    /// A collaborator call returned failure. Halts forward progress;
    /// retryable by re-invoking the same step.
    #[error("submission failed: {0}")]
    Submission(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<GatewayError> for ApplicationError {
    fn from(value: GatewayError) -> Self {
        Self::Submission(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::quote::QuoteStatus;
    use crate::gateway::GatewayError;

    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_error_wraps_into_application_error() {
        let error = ApplicationError::from(DomainError::InvalidQuoteTransition {
            from: QuoteStatus::Pendiente,
            to: QuoteStatus::Autorizada,
        });
        assert!(matches!(error, ApplicationError::Domain(_)));
    }

    #[test]
    fn gateway_failure_becomes_submission_error_with_message() {
        let error =
            ApplicationError::from(GatewayError::Rejected("pago duplicado".to_string()));
        assert_eq!(
            error.to_string(),
            "submission failed: collaborator rejected the request: pago duplicado"
        );
    }
}
