use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::flows::guards::{
    GuardIssue, GuardOutcome, CONTRACT_NOT_SIGNED, MISSING_CONDITION, NO_CONTRACT_WARNING,
    NO_PAYMENT_WARNING,
};
use crate::flows::states::{
    ClosingAction, ClosingContext, ClosingEvent, FlowKind, TransitionOutcome,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("authorization blocked: {0}")]
    BlockedByGuards(GuardOutcome),
    #[error("invalid transition from {status:?} using event {event:?}")]
    InvalidTransition { status: QuoteStatus, event: ClosingEvent },
}

/// One closing flow variant. The digital flow is driven by the prospect on
/// the public page; the staff-assisted flow by studio personnel.
pub trait ClosingFlow: Send + Sync {
    fn kind(&self) -> FlowKind;

    /// Guards for the event-creating authorization. Errors block and never
    /// reach a mutating collaborator; warnings proceed with confirmation.
    fn validate_authorize(&self, context: &ClosingContext) -> GuardOutcome;

    /// The irreversible authorize-and-create-event transition.
    fn authorize(&self, context: &ClosingContext)
        -> Result<TransitionOutcome, FlowTransitionError>;

    /// Digital only: flip to pending-signature without creating the event.
    fn request_signature(
        &self,
        context: &ClosingContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;

    /// Cancel the closing: back to `Pendiente`, delete the closing record,
    /// un-archive sibling quotes.
    fn cancel(&self, status: QuoteStatus) -> Result<TransitionOutcome, FlowTransitionError>;

    /// Whether the authorization run includes a contract-generation stage.
    fn includes_contract_stage(&self, context: &ClosingContext) -> bool;
}

pub fn flow_for(selected_by_prospect: bool) -> Box<dyn ClosingFlow> {
    if selected_by_prospect {
        Box::new(DigitalFlow)
    } else {
        Box::new(StaffAssistedFlow)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DigitalFlow;

impl ClosingFlow for DigitalFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Digital
    }

    fn validate_authorize(&self, context: &ClosingContext) -> GuardOutcome {
        let mut outcome = GuardOutcome::default();
        if !context.has_condition {
            outcome.error(GuardIssue::blocking(MISSING_CONDITION));
        }
        if !context.required_data_complete() {
            outcome.error(GuardIssue::missing_data(&context.missing_required_fields));
        }
        if context.status != QuoteStatus::ContractSigned {
            outcome.error(GuardIssue::blocking(CONTRACT_NOT_SIGNED));
        }
        outcome
    }

    fn authorize(
        &self,
        context: &ClosingContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let guards = self.validate_authorize(context);
        if guards.is_blocking() {
            return Err(FlowTransitionError::BlockedByGuards(guards));
        }

        Ok(TransitionOutcome {
            from: context.status,
            to: QuoteStatus::Autorizada,
            event: ClosingEvent::AuthorizeConfirmed,
            actions: vec![ClosingAction::ArchiveSiblingQuotes, ClosingAction::CreateEvent],
        })
    }

    fn request_signature(
        &self,
        context: &ClosingContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        if context.status != QuoteStatus::EnCierre {
            return Err(FlowTransitionError::InvalidTransition {
                status: context.status,
                event: ClosingEvent::SignatureRequested,
            });
        }

        let mut guards = GuardOutcome::default();
        if !context.has_condition {
            guards.error(GuardIssue::blocking(MISSING_CONDITION));
        }
        if !context.required_data_complete() {
            guards.error(GuardIssue::missing_data(&context.missing_required_fields));
        }
        if guards.is_blocking() {
            return Err(FlowTransitionError::BlockedByGuards(guards));
        }

        Ok(TransitionOutcome {
            from: context.status,
            to: QuoteStatus::ContractPending,
            event: ClosingEvent::SignatureRequested,
            actions: vec![ClosingAction::ArchiveSiblingQuotes, ClosingAction::AwaitSignature],
        })
    }

    fn cancel(&self, status: QuoteStatus) -> Result<TransitionOutcome, FlowTransitionError> {
        cancel_closing(status)
    }

    fn includes_contract_stage(&self, _context: &ClosingContext) -> bool {
        // The digital flow always carries a contract; it was generated on
        // the way to the signature, never during authorization.
        false
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StaffAssistedFlow;

impl ClosingFlow for StaffAssistedFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::StaffAssisted
    }

    fn validate_authorize(&self, context: &ClosingContext) -> GuardOutcome {
        let mut outcome = GuardOutcome::default();
        if !context.required_data_complete() {
            outcome.error(GuardIssue::missing_data(&context.missing_required_fields));
        }
        if context.wants_contract && !context.has_condition {
            outcome.error(GuardIssue::blocking(MISSING_CONDITION));
        }
        if !context.has_payment {
            outcome.warning(GuardIssue::blocking(NO_PAYMENT_WARNING));
        }
        if !context.has_contract && !context.wants_contract {
            outcome.warning(GuardIssue::blocking(NO_CONTRACT_WARNING));
        }
        outcome
    }

    fn authorize(
        &self,
        context: &ClosingContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let guards = self.validate_authorize(context);
        if guards.is_blocking() {
            return Err(FlowTransitionError::BlockedByGuards(guards));
        }
        if !matches!(context.status, QuoteStatus::EnCierre | QuoteStatus::Aprobada) {
            return Err(FlowTransitionError::InvalidTransition {
                status: context.status,
                event: ClosingEvent::AuthorizeConfirmed,
            });
        }

        Ok(TransitionOutcome {
            from: context.status,
            to: QuoteStatus::Autorizada,
            event: ClosingEvent::AuthorizeConfirmed,
            actions: vec![ClosingAction::ArchiveSiblingQuotes, ClosingAction::CreateEvent],
        })
    }

    fn request_signature(
        &self,
        context: &ClosingContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        Err(FlowTransitionError::InvalidTransition {
            status: context.status,
            event: ClosingEvent::SignatureRequested,
        })
    }

    fn cancel(&self, status: QuoteStatus) -> Result<TransitionOutcome, FlowTransitionError> {
        cancel_closing(status)
    }

    fn includes_contract_stage(&self, context: &ClosingContext) -> bool {
        context.wants_contract
    }
}

fn cancel_closing(status: QuoteStatus) -> Result<TransitionOutcome, FlowTransitionError> {
    if !matches!(
        status,
        QuoteStatus::EnCierre | QuoteStatus::ContractPending | QuoteStatus::ContractGenerated
    ) {
        return Err(FlowTransitionError::InvalidTransition {
            status,
            event: ClosingEvent::CancelRequested,
        });
    }

    Ok(TransitionOutcome {
        from: status,
        to: QuoteStatus::Pendiente,
        event: ClosingEvent::CancelRequested,
        actions: vec![
            ClosingAction::DeleteClosingRecord,
            ClosingAction::UnarchiveSiblingQuotes,
        ],
    })
}
