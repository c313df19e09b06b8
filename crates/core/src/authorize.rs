use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::{Sleeper, TokioSleeper};
use crate::domain::closing::Payment;
use crate::domain::promise::ContactPatch;
use crate::domain::quote::{Quote, QuoteId};
use crate::domain::{EventId, PromiseId, StudioId};
use crate::flows::{ClosingContext, ClosingFlow, FlowTransitionError, GuardOutcome};
use crate::flows::{FlowKind, TransitionOutcome};
use crate::gateway::{ClosingActions, ClosingStore};
use crate::reconcile::RetryPolicy;

/// Progress of one authorization attempt, surfaced to the UI. The
/// contract-generation stage appears only when the flow requests it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationStage {
    Idle,
    Validating,
    Sending,
    Registering,
    Collecting,
    GeneratingContract,
    Preparing,
    Completed,
    Error(String),
}

impl AuthorizationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error(_))
    }
}

impl fmt::Display for AuthorizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Sending => "sending",
            Self::Registering => "registering",
            Self::Collecting => "collecting",
            Self::GeneratingContract => "generating_contract",
            Self::Preparing => "preparing",
            Self::Completed => "completed",
            Self::Error(_) => "error",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub contact_patch: Option<ContactPatch>,
    pub with_contract: bool,
    pub payment: Option<Payment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizationOutcome {
    pub event_id: EventId,
    pub quote: Quote,
    pub transition: TransitionOutcome,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum AuthorizeFailure {
    /// A second trigger fired before the first attempt settled; dropped
    /// without side effects.
    #[error("an authorization attempt is already in flight")]
    AlreadyInFlight,
    /// Blocking guard failures. No mutating collaborator was called.
    #[error("validation failed: {0}")]
    Validation(GuardOutcome),
    #[error(transparent)]
    Transition(FlowTransitionError),
    /// A collaborator call failed at `stage`. Already-applied server-side
    /// writes stay; the UI offers retry or close and never auto-retries.
    #[error("{stage} failed: {message}")]
    Submission { stage: AuthorizationStage, message: String },
}

/// Synchronous re-entrancy latch: set before any asynchronous work starts,
/// cleared on completion and on error.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct InFlightGuard {
    engaged: bool,
}

impl InFlightGuard {
    pub(crate) fn engage(&mut self) -> bool {
        if self.engaged {
            return false;
        }
        self.engaged = true;
        true
    }

    pub(crate) fn release(&mut self) {
        self.engaged = false;
    }

    pub(crate) fn is_engaged(&self) -> bool {
        self.engaged
    }
}

/// Drives the multi-step authorization: validate, send contact data, submit
/// the authorization, collect derived data, optionally wait for the
/// generated contract, prepare the final view.
pub struct AuthorizationOrchestrator {
    stage: AuthorizationStage,
    guard: InFlightGuard,
    network_issued: bool,
    completion_seen: bool,
    contract_poll: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl AuthorizationOrchestrator {
    pub fn new(contract_poll: RetryPolicy) -> Self {
        Self::with_sleeper(contract_poll, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(contract_poll: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            stage: AuthorizationStage::Idle,
            guard: InFlightGuard::default(),
            network_issued: false,
            completion_seen: false,
            contract_poll,
            sleeper,
        }
    }

    pub fn stage(&self) -> &AuthorizationStage {
        &self.stage
    }

    /// The UI may be dismissed before the first network call is issued, and
    /// again once the attempt settles. In between, dismissal would orphan a
    /// partially-applied multi-step mutation.
    pub fn can_dismiss(&self) -> bool {
        !self.guard.is_engaged() || !self.network_issued
    }

    pub fn can_retry(&self) -> bool {
        matches!(self.stage, AuthorizationStage::Error(_))
    }

    /// Reports completion exactly once per completed attempt, so rendering
    /// the completed state twice cannot re-trigger side effects.
    pub fn acknowledge_completion(&mut self) -> bool {
        if self.stage == AuthorizationStage::Completed && !self.completion_seen {
            self.completion_seen = true;
            return true;
        }
        false
    }

    pub async fn run<G>(
        &mut self,
        gateway: &G,
        flow: &dyn ClosingFlow,
        context: &ClosingContext,
        studio_id: &StudioId,
        promise_id: &PromiseId,
        quote_id: &QuoteId,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthorizeFailure>
    where
        G: ClosingActions + ClosingStore,
    {
        if !self.guard.engage() {
            return Err(AuthorizeFailure::AlreadyInFlight);
        }
        self.network_issued = false;
        self.completion_seen = false;
        self.stage = AuthorizationStage::Validating;

        let guards = flow.validate_authorize(context);
        if guards.is_blocking() {
            self.stage = AuthorizationStage::Idle;
            self.guard.release();
            return Err(AuthorizeFailure::Validation(guards));
        }

        let transition = match flow.authorize(context) {
            Ok(transition) => transition,
            Err(error) => {
                self.stage = AuthorizationStage::Idle;
                self.guard.release();
                return Err(AuthorizeFailure::Transition(error));
            }
        };

        self.stage = AuthorizationStage::Sending;
        if let Some(patch) = request.contact_patch.as_ref().filter(|patch| !patch.is_empty()) {
            self.network_issued = true;
            if let Err(error) =
                gateway.update_contact_data(studio_id, promise_id, patch.clone()).await
            {
                return Err(self.fail(AuthorizationStage::Sending, error.to_string()));
            }
        }

        self.stage = AuthorizationStage::Registering;
        self.network_issued = true;
        let authorize_result = match flow.kind() {
            FlowKind::Digital => gateway.authorize_quote(studio_id, quote_id).await,
            FlowKind::StaffAssisted => {
                gateway
                    .authorize_quote_legacy(
                        studio_id,
                        quote_id,
                        request.with_contract,
                        request.payment.clone(),
                    )
                    .await
            }
        };
        let event_id = match authorize_result {
            Ok(event_id) => event_id,
            Err(error) => {
                return Err(self.fail(AuthorizationStage::Registering, error.to_string()))
            }
        };

        self.stage = AuthorizationStage::Collecting;
        let mut quote = match gateway.fetch_quote(studio_id, quote_id).await {
            Ok(quote) => quote,
            Err(error) => {
                return Err(self.fail(AuthorizationStage::Collecting, error.to_string()))
            }
        };

        if flow.includes_contract_stage(context) {
            self.stage = AuthorizationStage::GeneratingContract;
            if let Err(message) =
                self.wait_for_contract(gateway, studio_id, quote_id).await
            {
                return Err(self.fail(AuthorizationStage::GeneratingContract, message));
            }
        }

        self.stage = AuthorizationStage::Preparing;
        match gateway.fetch_quote(studio_id, quote_id).await {
            Ok(fresh) => quote = fresh,
            Err(error) => {
                return Err(self.fail(AuthorizationStage::Preparing, error.to_string()))
            }
        }

        self.stage = AuthorizationStage::Completed;
        self.guard.release();
        Ok(AuthorizationOutcome { event_id, quote, transition })
    }

    async fn wait_for_contract<G>(
        &self,
        gateway: &G,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), String>
    where
        G: ClosingStore,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match gateway.fetch_contract(studio_id, quote_id).await {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {}
                Err(error) => return Err(error.to_string()),
            }
            if self.contract_poll.is_exhausted(attempts) {
                return Err(format!(
                    "contract was not generated after {attempts} attempts"
                ));
            }
            self.sleeper.sleep(self.contract_poll.interval).await;
        }
    }

    fn fail(&mut self, stage: AuthorizationStage, message: String) -> AuthorizeFailure {
        self.stage = AuthorizationStage::Error(message.clone());
        self.guard.release();
        AuthorizeFailure::Submission { stage, message }
    }
}

/// Optimistic-update transaction: apply a local patch before the network
/// call, keep the pre-patch snapshot inside the transaction, then commit or
/// roll back based on the result.
#[derive(Debug)]
pub struct OptimisticTxn<T: Clone> {
    snapshot: T,
}

impl<T: Clone> OptimisticTxn<T> {
    pub fn apply(target: &mut T, patch: impl FnOnce(&mut T)) -> Self {
        let snapshot = target.clone();
        patch(target);
        Self { snapshot }
    }

    pub fn commit(self) {}

    pub fn rollback(self, target: &mut T) {
        *target = self.snapshot;
    }
}
