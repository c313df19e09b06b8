use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::closing::{
    ClosingRecord, CommercialCondition, Contract, Payment, TemplateId,
};
use crate::domain::promise::{ContactPatch, Promise};
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::domain::{EventId, PromiseId, StudioId};
use crate::reconcile::ChangeEvent;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("collaborator rejected the request: {0}")]
    Rejected(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("unknown entity: {0}")]
    NotFound(String),
}

/// Read side of the storage collaborator. Four slice-specific fetches so a
/// change limited to one slice never forces a full reload.
#[async_trait]
pub trait ClosingStore: Send + Sync {
    async fn fetch_promise(
        &self,
        studio_id: &StudioId,
        promise_id: &PromiseId,
    ) -> Result<Promise, GatewayError>;
    async fn fetch_quote(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Quote, GatewayError>;
    async fn fetch_condition(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<CommercialCondition>, GatewayError>;
    async fn fetch_contract(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<Contract>, GatewayError>;
    async fn fetch_payment(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<Payment>, GatewayError>;
}

/// Mutation side of the storage collaborator.
#[async_trait]
pub trait ClosingActions: Send + Sync {
    async fn submit_condition(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
        condition: CommercialCondition,
    ) -> Result<(), GatewayError>;
    async fn remove_condition(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError>;
    async fn submit_contract_template(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
        template_id: TemplateId,
        content: String,
    ) -> Result<Contract, GatewayError>;
    async fn regenerate_contract(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Contract, GatewayError>;
    async fn sign_contract(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
        signed_at: DateTime<Utc>,
    ) -> Result<Contract, GatewayError>;
    async fn request_signature(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError>;
    async fn submit_payment(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
        payment: Payment,
    ) -> Result<(), GatewayError>;
    async fn authorize_quote(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<EventId, GatewayError>;
    async fn authorize_quote_legacy(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
        with_contract: bool,
        payment: Option<Payment>,
    ) -> Result<EventId, GatewayError>;
    async fn update_contact_data(
        &self,
        studio_id: &StudioId,
        promise_id: &PromiseId,
        patch: ContactPatch,
    ) -> Result<(), GatewayError>;
    async fn cancel_closing(
        &self,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError>;
}

/// Change-notification feed. The engine only consumes events; delivery
/// order across events is not guaranteed.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(
        &self,
        studio_id: &StudioId,
        promise_id: &PromiseId,
    ) -> mpsc::UnboundedReceiver<ChangeEvent>;
}

#[derive(Clone, Default)]
pub struct InMemoryChangeFeed {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>>,
}

impl InMemoryChangeFeed {
    pub fn publish(&self, event: ChangeEvent) {
        let mut senders = lock(&self.senders);
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl ChangeFeed for InMemoryChangeFeed {
    fn subscribe(
        &self,
        _studio_id: &StudioId,
        _promise_id: &PromiseId,
    ) -> mpsc::UnboundedReceiver<ChangeEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        lock(&self.senders).push(sender);
        receiver
    }
}

#[derive(Debug, Default)]
struct StudioState {
    promise: Option<Promise>,
    quotes: HashMap<QuoteId, Quote>,
    records: HashMap<QuoteId, ClosingRecord>,
    call_counts: HashMap<&'static str, usize>,
    fail_next: HashMap<&'static str, String>,
    event_sequence: u32,
}

/// In-memory stand-in for the studio's storage service. Backs the unit and
/// end-to-end tests and the CLI simulator; counts every mutating call so
/// tests can assert a collaborator was (not) reached.
#[derive(Clone, Default)]
pub struct InMemoryStudio {
    state: Arc<Mutex<StudioState>>,
}

impl InMemoryStudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_promise(self, promise: Promise) -> Self {
        lock(&self.state).promise = Some(promise);
        self
    }

    pub fn with_quote(self, quote: Quote) -> Self {
        {
            let mut state = lock(&self.state);
            state.records.entry(quote.id.clone()).or_default();
            state.quotes.insert(quote.id.clone(), quote);
        }
        self
    }

    /// Makes the next call of `operation` fail with `message`.
    pub fn fail_next(&self, operation: &'static str, message: impl Into<String>) {
        lock(&self.state).fail_next.insert(operation, message.into());
    }

    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.state).call_counts.get(operation).copied().unwrap_or(0)
    }

    pub fn quote(&self, quote_id: &QuoteId) -> Option<Quote> {
        lock(&self.state).quotes.get(quote_id).cloned()
    }

    pub fn record(&self, quote_id: &QuoteId) -> Option<ClosingRecord> {
        lock(&self.state).records.get(quote_id).cloned()
    }

    fn enter(&self, operation: &'static str) -> Result<(), GatewayError> {
        let mut state = lock(&self.state);
        *state.call_counts.entry(operation).or_insert(0) += 1;
        if let Some(message) = state.fail_next.remove(operation) {
            return Err(GatewayError::Rejected(message));
        }
        Ok(())
    }

    fn authorize_internal(
        state: &mut StudioState,
        quote_id: &QuoteId,
    ) -> Result<EventId, GatewayError> {
        state.event_sequence += 1;
        let event_id = EventId(format!("E-{:04}", state.event_sequence));

        let Some(quote) = state.quotes.get_mut(quote_id) else {
            return Err(GatewayError::NotFound(format!("quote {}", quote_id.0)));
        };
        quote.status = QuoteStatus::Autorizada;
        quote.evento_id = Some(event_id.clone());

        for sibling in state.quotes.values_mut() {
            if sibling.id != *quote_id {
                sibling.archived = true;
            }
        }
        Ok(event_id)
    }
}

#[async_trait]
impl ClosingStore for InMemoryStudio {
    async fn fetch_promise(
        &self,
        _studio_id: &StudioId,
        promise_id: &PromiseId,
    ) -> Result<Promise, GatewayError> {
        self.enter("fetch_promise")?;
        lock(&self.state)
            .promise
            .clone()
            .ok_or_else(|| GatewayError::NotFound(format!("promise {}", promise_id.0)))
    }

    async fn fetch_quote(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Quote, GatewayError> {
        self.enter("fetch_quote")?;
        lock(&self.state)
            .quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("quote {}", quote_id.0)))
    }

    async fn fetch_condition(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<CommercialCondition>, GatewayError> {
        self.enter("fetch_condition")?;
        Ok(lock(&self.state).records.get(quote_id).and_then(|r| r.condition.clone()))
    }

    async fn fetch_contract(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<Contract>, GatewayError> {
        self.enter("fetch_contract")?;
        Ok(lock(&self.state).records.get(quote_id).and_then(|r| r.contract.clone()))
    }

    async fn fetch_payment(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Option<Payment>, GatewayError> {
        self.enter("fetch_payment")?;
        Ok(lock(&self.state).records.get(quote_id).and_then(|r| r.payment.clone()))
    }
}

#[async_trait]
impl ClosingActions for InMemoryStudio {
    async fn submit_condition(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
        condition: CommercialCondition,
    ) -> Result<(), GatewayError> {
        self.enter("submit_condition")?;
        lock(&self.state).records.entry(quote_id.clone()).or_default().condition =
            Some(condition);
        Ok(())
    }

    async fn remove_condition(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError> {
        self.enter("remove_condition")?;
        if let Some(record) = lock(&self.state).records.get_mut(quote_id) {
            record.condition = None;
        }
        Ok(())
    }

    async fn submit_contract_template(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
        template_id: TemplateId,
        content: String,
    ) -> Result<Contract, GatewayError> {
        self.enter("submit_contract_template")?;
        let contract = Contract::new(template_id, content);
        let mut state = lock(&self.state);
        state.records.entry(quote_id.clone()).or_default().contract = Some(contract.clone());
        if let Some(quote) = state.quotes.get_mut(quote_id) {
            if quote.can_transition_to(QuoteStatus::ContractGenerated) {
                quote.status = QuoteStatus::ContractGenerated;
            }
        }
        Ok(contract)
    }

    async fn regenerate_contract(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<Contract, GatewayError> {
        self.enter("regenerate_contract")?;
        let mut state = lock(&self.state);
        let Some(contract) =
            state.records.get_mut(quote_id).and_then(|record| record.contract.as_mut())
        else {
            return Err(GatewayError::NotFound(format!(
                "contract for quote {}",
                quote_id.0
            )));
        };
        let rendered = contract.content.clone();
        contract
            .regenerate(rendered)
            .map_err(|error| GatewayError::Rejected(error.to_string()))?;
        Ok(contract.clone())
    }

    async fn sign_contract(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
        signed_at: DateTime<Utc>,
    ) -> Result<Contract, GatewayError> {
        self.enter("sign_contract")?;
        let mut state = lock(&self.state);
        let Some(contract) =
            state.records.get_mut(quote_id).and_then(|record| record.contract.as_mut())
        else {
            return Err(GatewayError::NotFound(format!(
                "contract for quote {}",
                quote_id.0
            )));
        };
        contract.sign(signed_at).map_err(|error| GatewayError::Rejected(error.to_string()))?;
        let signed = contract.clone();
        if let Some(quote) = state.quotes.get_mut(quote_id) {
            if quote.can_transition_to(QuoteStatus::ContractSigned) {
                quote.status = QuoteStatus::ContractSigned;
            }
        }
        Ok(signed)
    }

    async fn request_signature(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError> {
        self.enter("request_signature")?;
        let mut state = lock(&self.state);
        let Some(quote) = state.quotes.get_mut(quote_id) else {
            return Err(GatewayError::NotFound(format!("quote {}", quote_id.0)));
        };
        if !quote.can_transition_to(QuoteStatus::ContractPending) {
            return Err(GatewayError::Rejected(format!(
                "quote {} cannot await a signature from {:?}",
                quote_id.0, quote.status
            )));
        }
        quote.status = QuoteStatus::ContractPending;
        for sibling in state.quotes.values_mut() {
            if sibling.id != *quote_id {
                sibling.archived = true;
            }
        }
        Ok(())
    }

    async fn submit_payment(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
        payment: Payment,
    ) -> Result<(), GatewayError> {
        self.enter("submit_payment")?;
        lock(&self.state).records.entry(quote_id.clone()).or_default().payment = Some(payment);
        Ok(())
    }

    async fn authorize_quote(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<EventId, GatewayError> {
        self.enter("authorize_quote")?;
        let mut state = lock(&self.state);
        Self::authorize_internal(&mut state, quote_id)
    }

    async fn authorize_quote_legacy(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
        with_contract: bool,
        payment: Option<Payment>,
    ) -> Result<EventId, GatewayError> {
        self.enter("authorize_quote_legacy")?;
        let mut state = lock(&self.state);
        if let Some(payment) = payment {
            state.records.entry(quote_id.clone()).or_default().payment = Some(payment);
        }
        if with_contract {
            let record = state.records.entry(quote_id.clone()).or_default();
            match record.contract.as_mut() {
                Some(contract) => {
                    let rendered = contract.content.clone();
                    contract
                        .regenerate(rendered)
                        .map_err(|error| GatewayError::Rejected(error.to_string()))?;
                }
                None => {
                    record.contract = Some(Contract::new(
                        TemplateId("T-default".to_string()),
                        "contrato generado",
                    ));
                }
            }
        }
        Self::authorize_internal(&mut state, quote_id)
    }

    async fn update_contact_data(
        &self,
        _studio_id: &StudioId,
        promise_id: &PromiseId,
        patch: ContactPatch,
    ) -> Result<(), GatewayError> {
        self.enter("update_contact_data")?;
        let mut state = lock(&self.state);
        let Some(promise) = state.promise.as_mut() else {
            return Err(GatewayError::NotFound(format!("promise {}", promise_id.0)));
        };
        patch.apply_to(promise);
        Ok(())
    }

    async fn cancel_closing(
        &self,
        _studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<(), GatewayError> {
        self.enter("cancel_closing")?;
        let mut state = lock(&self.state);
        state.records.remove(quote_id);
        if let Some(quote) = state.quotes.get_mut(quote_id) {
            quote.status = QuoteStatus::Pendiente;
        }
        for sibling in state.quotes.values_mut() {
            if sibling.id != *quote_id {
                sibling.archived = false;
            }
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
