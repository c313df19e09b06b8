use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::aggregate::{ClosingAggregator, ClosingView, Slice};
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::authorize::{
    AuthorizationOrchestrator, AuthorizationOutcome, AuthorizationRequest, AuthorizeFailure,
    OptimisticTxn,
};
use crate::clock::Clock;
use crate::config::ReconcileConfig;
use crate::domain::closing::{CommercialCondition, Contract, Payment, TemplateId};
use crate::domain::promise::ContactPatch;
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::domain::{PromiseId, StudioId};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::guards::MISSING_CONDITION;
use crate::flows::{flow_for, ClosingContext, ClosingFlow, FlowKind, GuardIssue, GuardOutcome};
use crate::gateway::{ClosingActions, ClosingStore};
use crate::pricing::{DeterministicPricingEngine, PriceBreakdown, PricingEngine, PricingOverrides};
use crate::reconcile::{ChangeEvent, LockKey, ReconcileOutcome, Reconciler};

/// One opened closing per quote. Owns the flow variant, the slice
/// aggregator, the reconciler for the change feed, and the authorization
/// orchestrator; every mutation goes through the storage collaborator and
/// then refreshes only the slice it touched.
pub struct ClosingSession<G>
where
    G: ClosingStore + ClosingActions,
{
    gateway: Arc<G>,
    audit: Arc<dyn AuditSink>,
    pricing: DeterministicPricingEngine,
    flow: Box<dyn ClosingFlow>,
    studio_id: StudioId,
    promise_id: PromiseId,
    quote_id: QuoteId,
    quote: Quote,
    aggregator: ClosingAggregator,
    reconciler: Reconciler,
    orchestrator: AuthorizationOrchestrator,
    wants_contract: bool,
}

impl<G> ClosingSession<G>
where
    G: ClosingStore + ClosingActions,
{
    pub async fn open(
        gateway: Arc<G>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: &ReconcileConfig,
        studio_id: StudioId,
        promise_id: PromiseId,
        quote_id: QuoteId,
    ) -> Result<Self, ApplicationError> {
        let quote = gateway.fetch_quote(&studio_id, &quote_id).await?;
        // The flow variant is fixed here, from the quote, for the whole
        // session.
        let flow = flow_for(quote.selected_by_prospect);

        let mut aggregator = ClosingAggregator::new();
        aggregator
            .refresh_all(gateway.as_ref(), &studio_id, &promise_id, &quote_id)
            .await?;

        let reconciler = Reconciler::new(
            LockKey { studio_id: studio_id.clone(), promise_id: promise_id.clone() },
            config.cooldown(),
            clock,
            &quote,
        );

        info!(
            event_name = "closing.session_opened",
            quote_id = %quote_id.0,
            flow = ?flow.kind(),
            status = ?quote.status,
        );

        Ok(Self {
            gateway,
            audit,
            pricing: DeterministicPricingEngine,
            flow,
            studio_id,
            promise_id,
            quote_id,
            quote,
            aggregator,
            reconciler,
            orchestrator: AuthorizationOrchestrator::new(config.poll_policy()),
            wants_contract: false,
        })
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn view(&self) -> &ClosingView {
        self.aggregator.view()
    }

    pub fn flow_kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn orchestrator(&self) -> &AuthorizationOrchestrator {
        &self.orchestrator
    }

    /// Staff-assisted only: whether authorization should also generate a
    /// contract.
    pub fn set_wants_contract(&mut self, wants_contract: bool) {
        self.wants_contract = wants_contract;
    }

    pub fn context(&self) -> ClosingContext {
        let view = self.aggregator.view();
        ClosingContext {
            status: self.quote.status,
            has_condition: view.condition.is_some(),
            has_contract: view.contract.is_some(),
            contract_signed: view.contract.as_ref().is_some_and(Contract::is_signed),
            has_payment: view.payment.is_some(),
            wants_contract: self.wants_contract,
            missing_required_fields: view
                .required
                .missing_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Recomputed on every call; never cached or persisted.
    pub fn breakdown(&self, overrides: &PricingOverrides) -> PriceBreakdown {
        self.pricing.breakdown(&self.quote, self.aggregator.view().condition.as_ref(), overrides)
    }

    pub async fn select_condition(
        &mut self,
        condition: CommercialCondition,
    ) -> Result<(), ApplicationError> {
        self.gateway.submit_condition(&self.studio_id, &self.quote_id, condition).await?;
        self.aggregator
            .refresh_condition(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
            .await?;
        self.emit("closing.condition_selected", AuditCategory::Pricing, AuditOutcome::Success);
        Ok(())
    }

    pub async fn remove_condition(&mut self) -> Result<(), ApplicationError> {
        self.gateway.remove_condition(&self.studio_id, &self.quote_id).await?;
        self.aggregator
            .refresh_condition(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
            .await?;
        self.emit("closing.condition_removed", AuditCategory::Pricing, AuditOutcome::Success);
        Ok(())
    }

    /// Generates a contract from a template. Blocked while no commercial
    /// condition is selected; the collaborator is never called in that case.
    pub async fn request_contract(
        &mut self,
        template_id: TemplateId,
        content: String,
    ) -> Result<Contract, ApplicationError> {
        if self.aggregator.view().condition.is_none() {
            let mut guards = GuardOutcome::default();
            guards.error(GuardIssue::blocking(MISSING_CONDITION));
            self.emit("closing.contract_rejected", AuditCategory::Flow, AuditOutcome::Rejected);
            return Err(ApplicationError::Validation(guards));
        }

        let contract = self
            .gateway
            .submit_contract_template(&self.studio_id, &self.quote_id, template_id, content)
            .await?;
        self.aggregator
            .refresh_contract(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
            .await?;
        self.reload_quote().await?;
        self.emit("closing.contract_requested", AuditCategory::Flow, AuditOutcome::Success);
        Ok(contract)
    }

    /// Re-renders the contract. The version increments; the signature state
    /// is untouched because unsigned contracts are the only ones that may be
    /// regenerated.
    pub async fn regenerate_contract(&mut self) -> Result<Contract, ApplicationError> {
        let contract =
            self.gateway.regenerate_contract(&self.studio_id, &self.quote_id).await?;
        self.aggregator
            .refresh_contract(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
            .await?;
        self.emit("closing.contract_regenerated", AuditCategory::Flow, AuditOutcome::Success);
        Ok(contract)
    }

    /// Digital only: move the quote to awaiting-signature. No event is
    /// created here.
    pub async fn request_signature(&mut self) -> Result<(), ApplicationError> {
        self.flow.request_signature(&self.context()).map_err(DomainError::from)?;
        self.gateway.request_signature(&self.studio_id, &self.quote_id).await?;
        self.reload_quote().await?;
        self.emit("closing.signature_requested", AuditCategory::Flow, AuditOutcome::Success);
        Ok(())
    }

    /// Marks the contract signed, optimistically flipping the local status
    /// first and rolling back if the collaborator rejects the signature.
    pub async fn sign_contract(
        &mut self,
        signed_at: DateTime<Utc>,
    ) -> Result<Contract, ApplicationError> {
        if !self.quote.can_transition_to(QuoteStatus::ContractSigned) {
            return Err(DomainError::InvalidQuoteTransition {
                from: self.quote.status,
                to: QuoteStatus::ContractSigned,
            }
            .into());
        }

        let txn = OptimisticTxn::apply(&mut self.quote, |quote| {
            quote.status = QuoteStatus::ContractSigned;
        });
        match self.gateway.sign_contract(&self.studio_id, &self.quote_id, signed_at).await {
            Ok(contract) => {
                txn.commit();
                self.aggregator
                    .refresh_contract(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
                    .await?;
                self.reconciler.snapshot_quote(&self.quote);
                self.emit("closing.contract_signed", AuditCategory::Flow, AuditOutcome::Success);
                Ok(contract)
            }
            Err(error) => {
                txn.rollback(&mut self.quote);
                self.emit("closing.contract_sign_failed", AuditCategory::Flow, AuditOutcome::Failed);
                Err(error.into())
            }
        }
    }

    pub async fn confirm_payment(&mut self, payment: Payment) -> Result<(), ApplicationError> {
        self.gateway.submit_payment(&self.studio_id, &self.quote_id, payment).await?;
        self.aggregator
            .refresh_payment(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
            .await?;
        self.emit("closing.payment_confirmed", AuditCategory::Flow, AuditOutcome::Success);
        Ok(())
    }

    pub async fn update_contact_data(
        &mut self,
        patch: ContactPatch,
    ) -> Result<(), ApplicationError> {
        self.gateway.update_contact_data(&self.studio_id, &self.promise_id, patch).await?;
        self.aggregator
            .refresh_completeness(self.gateway.as_ref(), &self.studio_id, &self.promise_id)
            .await?;
        self.emit("closing.contact_updated", AuditCategory::Flow, AuditOutcome::Success);
        Ok(())
    }

    /// The irreversible authorize-and-create-event run. Guard failures are
    /// reported without touching any collaborator; a mid-run failure halts
    /// with already-applied writes kept, retryable by calling again.
    pub async fn authorize(
        &mut self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, AuthorizeFailure> {
        let context = self.context();
        let result = self
            .orchestrator
            .run(
                self.gateway.as_ref(),
                self.flow.as_ref(),
                &context,
                &self.studio_id,
                &self.promise_id,
                &self.quote_id,
                request,
            )
            .await;

        match &result {
            Ok(outcome) => {
                self.quote = outcome.quote.clone();
                self.reconciler.snapshot_quote(&self.quote);
                self.emit("closing.authorized", AuditCategory::Authorization, AuditOutcome::Success);
            }
            Err(AuthorizeFailure::Validation(_)) | Err(AuthorizeFailure::Transition(_)) => {
                self.emit(
                    "closing.authorize_rejected",
                    AuditCategory::Authorization,
                    AuditOutcome::Rejected,
                );
            }
            Err(AuthorizeFailure::AlreadyInFlight) => {}
            Err(AuthorizeFailure::Submission { .. }) => {
                self.emit(
                    "closing.authorize_failed",
                    AuditCategory::Authorization,
                    AuditOutcome::Failed,
                );
            }
        }
        result
    }

    /// Cancels the closing: status back to `Pendiente`, the closing record
    /// deleted, sibling quotes un-archived, every local slice cleared.
    pub async fn cancel(&mut self) -> Result<(), ApplicationError> {
        let outcome = self.flow.cancel(self.quote.status).map_err(DomainError::from)?;
        self.gateway.cancel_closing(&self.studio_id, &self.quote_id).await?;

        self.aggregator.clear();
        self.quote.status = outcome.to;
        self.reconciler.snapshot_quote(&self.quote);
        self.emit("closing.cancelled", AuditCategory::Flow, AuditOutcome::Success);
        Ok(())
    }

    /// Feeds one change notification through the reconciler and performs the
    /// refetch it asks for. Refetch failures are logged and swallowed; the
    /// session keeps its last consistent state and later events retry.
    pub async fn handle_change_event(&mut self, event: &ChangeEvent) -> ReconcileOutcome {
        let outcome = self.reconciler.observe(event);
        if let ReconcileOutcome::RefetchNeeded(slice) = &outcome {
            if let Err(error) = self.refetch(*slice).await {
                warn!(
                    event_name = "closing.refetch_failed",
                    slice = ?slice,
                    error = %error,
                );
            }
            self.reconciler.refetch_finished();
        }
        outcome
    }

    pub fn pending_changes(&self) -> u32 {
        self.reconciler.pending_changes()
    }

    pub fn auto_applied(&self) -> u32 {
        self.reconciler.auto_applied()
    }

    /// The explicit "apply" affordance: consumes the pending counter and
    /// refreshes everything.
    pub async fn apply_pending(&mut self) -> Result<(), ApplicationError> {
        if self.reconciler.take_pending() == 0 {
            return Ok(());
        }
        self.aggregator
            .refresh_all(self.gateway.as_ref(), &self.studio_id, &self.promise_id, &self.quote_id)
            .await?;
        self.reload_quote().await?;
        Ok(())
    }

    async fn refetch(&mut self, slice: Slice) -> Result<(), ApplicationError> {
        match slice {
            Slice::Condition => {
                self.aggregator
                    .refresh_condition(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
                    .await?;
            }
            Slice::Contract => {
                self.aggregator
                    .refresh_contract(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
                    .await?;
            }
            Slice::Payment => {
                self.aggregator
                    .refresh_payment(self.gateway.as_ref(), &self.studio_id, &self.quote_id)
                    .await?;
            }
            Slice::Completeness => {
                self.aggregator
                    .refresh_completeness(self.gateway.as_ref(), &self.studio_id, &self.promise_id)
                    .await?;
            }
            Slice::Quote => self.reload_quote().await?,
        }
        Ok(())
    }

    async fn reload_quote(&mut self) -> Result<(), ApplicationError> {
        self.quote = self.gateway.fetch_quote(&self.studio_id, &self.quote_id).await?;
        self.reconciler.snapshot_quote(&self.quote);
        Ok(())
    }

    fn emit(&self, event_type: &str, category: AuditCategory, outcome: AuditOutcome) {
        let context = AuditContext::new(
            self.studio_id.clone(),
            self.promise_id.clone(),
            Some(self.quote_id.clone()),
            match self.flow.kind() {
                FlowKind::Digital => "prospect",
                FlowKind::StaffAssisted => "staff",
            },
        );
        self.audit.emit(AuditEvent::new(&context, event_type, category, outcome));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Map};

    use crate::audit::InMemoryAuditSink;
    use crate::clock::ManualClock;
    use crate::config::ReconcileConfig;
    use crate::domain::closing::{AdvanceKind, CommercialCondition, ConditionId, TemplateId};
    use crate::domain::promise::Promise;
    use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
    use crate::domain::{PromiseId, StudioId};
    use crate::errors::ApplicationError;
    use crate::gateway::{ClosingActions, InMemoryStudio};
    use crate::reconcile::{ChangeEvent, ChangeKind, ChangeTable, ReconcileOutcome};

    use super::ClosingSession;

    fn studio_id() -> StudioId {
        StudioId("S-1".to_string())
    }

    fn promise_id() -> PromiseId {
        PromiseId("P-1".to_string())
    }

    fn quote_id() -> QuoteId {
        QuoteId("C-1".to_string())
    }

    fn promise() -> Promise {
        Promise {
            id: promise_id(),
            studio_id: studio_id(),
            name: Some("Ana Torres".to_string()),
            phone: Some("555-0101".to_string()),
            email: Some("ana@example.com".to_string()),
            address: Some("Av. Reforma 10".to_string()),
            event_name: Some("XV Valeria".to_string()),
            event_location: Some("Salón Diamante".to_string()),
            event_date: chrono::NaiveDate::from_ymd_opt(2026, 11, 14),
        }
    }

    fn quote(status: QuoteStatus) -> Quote {
        Quote {
            id: quote_id(),
            promise_id: promise_id(),
            name: "Boda jardín".to_string(),
            base_price: Decimal::new(10_000, 0),
            flat_discount: Decimal::ZERO,
            status,
            selected_by_prospect: false,
            evento_id: None,
            archived: false,
            created_at: Utc::now(),
        }
    }

    fn condition() -> CommercialCondition {
        CommercialCondition {
            id: ConditionId("cond-1".to_string()),
            name: "Contado".to_string(),
            discount_pct: Decimal::new(10, 0),
            advance: AdvanceKind::Percentage { pct: Decimal::new(30, 0) },
        }
    }

    fn config() -> ReconcileConfig {
        ReconcileConfig { cooldown_secs: 5, poll_interval_secs: 1, max_poll_attempts: 3 }
    }

    async fn open_session(studio: InMemoryStudio) -> ClosingSession<InMemoryStudio> {
        ClosingSession::open(
            Arc::new(studio),
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(ManualClock::at(
                Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).single().expect("valid"),
            )),
            &config(),
            studio_id(),
            promise_id(),
            quote_id(),
        )
        .await
        .expect("session opens")
    }

    #[tokio::test]
    async fn contract_request_without_condition_is_blocked_locally() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio.clone()).await;

        let error = session
            .request_contract(TemplateId("T-1".to_string()), "contenido".to_string())
            .await
            .expect_err("blocked without condition");

        let ApplicationError::Validation(guards) = error else {
            panic!("expected a validation error");
        };
        assert_eq!(
            guards.to_string(),
            "La cotización debe tener condiciones comerciales asociadas"
        );
        assert_eq!(studio.calls("submit_contract_template"), 0);
    }

    #[tokio::test]
    async fn condition_then_contract_updates_only_their_slices() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio.clone()).await;

        session.select_condition(condition()).await.expect("condition selects");
        assert!(session.view().condition.is_some());

        let contract = session
            .request_contract(TemplateId("T-1".to_string()), "contenido".to_string())
            .await
            .expect("contract generates");
        assert_eq!(contract.version, 1);
        assert_eq!(session.quote().status, QuoteStatus::ContractGenerated);

        let breakdown = session.breakdown(&Default::default());
        assert_eq!(breakdown.price_after_discount, Decimal::new(9_000, 0));
        assert_eq!(breakdown.advance_amount, Decimal::new(2_700, 0));
        assert_eq!(breakdown.deferred_amount, Decimal::new(6_300, 0));
    }

    #[tokio::test]
    async fn regeneration_bumps_the_version_and_keeps_it_unsigned() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio).await;

        session.select_condition(condition()).await.expect("condition selects");
        session
            .request_contract(TemplateId("T-1".to_string()), "contenido".to_string())
            .await
            .expect("contract generates");

        let regenerated = session.regenerate_contract().await.expect("regenerates");
        assert_eq!(regenerated.version, 2);
        assert!(regenerated.signed_at.is_none());
    }

    #[tokio::test]
    async fn signing_rolls_back_when_the_collaborator_rejects() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio.clone()).await;

        session.select_condition(condition()).await.expect("condition selects");
        session
            .request_contract(TemplateId("T-1".to_string()), "contenido".to_string())
            .await
            .expect("contract generates");

        studio.fail_next("sign_contract", "firma inválida");
        let error = session.sign_contract(Utc::now()).await.expect_err("sign fails");
        assert!(matches!(error, ApplicationError::Submission(_)));
        // The optimistic status flip was rolled back.
        assert_eq!(session.quote().status, QuoteStatus::ContractGenerated);

        session.sign_contract(Utc::now()).await.expect("retry succeeds");
        assert_eq!(session.quote().status, QuoteStatus::ContractSigned);
    }

    #[tokio::test]
    async fn cancel_reverts_and_clears_every_slice() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio.clone()).await;

        session.select_condition(condition()).await.expect("condition selects");
        session.cancel().await.expect("cancel succeeds");

        assert_eq!(session.quote().status, QuoteStatus::Pendiente);
        assert!(session.view().condition.is_none());
        assert!(studio.record(&quote_id()).is_none());
    }

    #[tokio::test]
    async fn change_events_refetch_only_the_named_slice() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio.clone()).await;
        let fetches_before = studio.calls("fetch_condition");

        studio
            .submit_condition(&studio_id(), &quote_id(), condition())
            .await
            .expect("condition lands out of band");

        let outcome = session
            .handle_change_event(&ChangeEvent {
                entity_id: "C-1".to_string(),
                table: ChangeTable::ClosingConditions,
                kind: ChangeKind::Update,
                changed_fields: vec!["discount_pct".to_string()],
                new_values: Map::new(),
            })
            .await;

        assert!(matches!(outcome, ReconcileOutcome::RefetchNeeded(_)));
        assert!(session.view().condition.is_some());
        assert_eq!(studio.calls("fetch_condition"), fetches_before + 1);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_the_last_known_state_and_retries_later() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let clock = ManualClock::at(
            Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).single().expect("valid"),
        );
        let mut session = ClosingSession::open(
            Arc::new(studio.clone()),
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(clock.clone()),
            &config(),
            studio_id(),
            promise_id(),
            quote_id(),
        )
        .await
        .expect("session opens");

        studio
            .submit_condition(&studio_id(), &quote_id(), condition())
            .await
            .expect("condition lands out of band");
        studio.fail_next("fetch_condition", "conexión perdida");

        let event = ChangeEvent {
            entity_id: "C-1".to_string(),
            table: ChangeTable::ClosingConditions,
            kind: ChangeKind::Update,
            changed_fields: vec!["discount_pct".to_string()],
            new_values: Map::new(),
        };

        let outcome = session.handle_change_event(&event).await;
        assert!(matches!(outcome, ReconcileOutcome::RefetchNeeded(_)));
        // The failed refetch was swallowed; the view kept its prior state.
        assert!(session.view().condition.is_none());

        // Inside the cool-down nothing retriggers.
        assert!(matches!(
            session.handle_change_event(&event).await,
            ReconcileOutcome::RefetchDropped(_)
        ));

        clock.advance(Duration::seconds(6));
        let outcome = session.handle_change_event(&event).await;
        assert!(matches!(outcome, ReconcileOutcome::RefetchNeeded(_)));
        assert!(session.view().condition.is_some());
    }

    #[tokio::test]
    async fn sibling_quote_churn_waits_for_the_apply_action() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio).await;

        let event = ChangeEvent {
            entity_id: "C-9".to_string(),
            table: ChangeTable::Quotes,
            kind: ChangeKind::Insert,
            changed_fields: Vec::new(),
            new_values: Map::new(),
        };
        assert_eq!(session.handle_change_event(&event).await, ReconcileOutcome::PendingApply);
        assert_eq!(session.pending_changes(), 1);

        session.apply_pending().await.expect("apply refreshes");
        assert_eq!(session.pending_changes(), 0);
    }

    #[tokio::test]
    async fn echo_of_a_local_write_is_discarded() {
        let studio =
            InMemoryStudio::new().with_promise(promise()).with_quote(quote(QuoteStatus::EnCierre));
        let mut session = open_session(studio).await;

        let mut new_values = Map::new();
        new_values.insert("name".to_string(), json!("Boda jardín"));
        let echo = ChangeEvent {
            entity_id: "C-1".to_string(),
            table: ChangeTable::Quotes,
            kind: ChangeKind::Update,
            changed_fields: vec!["name".to_string()],
            new_values,
        };

        assert_eq!(session.handle_change_event(&echo).await, ReconcileOutcome::Discarded);
        assert_eq!(session.auto_applied(), 0);
    }
}
