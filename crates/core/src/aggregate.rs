use serde::{Deserialize, Serialize};

use crate::domain::closing::{CommercialCondition, Contract, Payment};
use crate::domain::promise::RequiredData;
use crate::domain::quote::QuoteId;
use crate::domain::{PromiseId, StudioId};
use crate::gateway::{ClosingStore, GatewayError};

/// One independently loadable part of the closing view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slice {
    Condition,
    Contract,
    Payment,
    Completeness,
    Quote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceRefresh {
    pub slice: Slice,
    pub changed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosingView {
    pub condition: Option<CommercialCondition>,
    pub contract: Option<Contract>,
    pub payment: Option<Payment>,
    pub required: RequiredData,
}

/// Assembles the four closing slices and refreshes each one independently,
/// so a change limited to one slice never discards in-flight edits to
/// another. A refresh whose fetched value is structurally identical to the
/// cached one reports `changed: false` and touches nothing.
#[derive(Clone, Debug, Default)]
pub struct ClosingAggregator {
    view: ClosingView,
}

impl ClosingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &ClosingView {
        &self.view
    }

    pub async fn refresh_condition<S: ClosingStore>(
        &mut self,
        store: &S,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<SliceRefresh, GatewayError> {
        let fetched = store.fetch_condition(studio_id, quote_id).await?;
        let changed = fetched != self.view.condition;
        if changed {
            self.view.condition = fetched;
        }
        Ok(SliceRefresh { slice: Slice::Condition, changed })
    }

    pub async fn refresh_contract<S: ClosingStore>(
        &mut self,
        store: &S,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<SliceRefresh, GatewayError> {
        let fetched = store.fetch_contract(studio_id, quote_id).await?;
        let changed = fetched != self.view.contract;
        if changed {
            self.view.contract = fetched;
        }
        Ok(SliceRefresh { slice: Slice::Contract, changed })
    }

    pub async fn refresh_payment<S: ClosingStore>(
        &mut self,
        store: &S,
        studio_id: &StudioId,
        quote_id: &QuoteId,
    ) -> Result<SliceRefresh, GatewayError> {
        let fetched = store.fetch_payment(studio_id, quote_id).await?;
        let changed = fetched != self.view.payment;
        if changed {
            self.view.payment = fetched;
        }
        Ok(SliceRefresh { slice: Slice::Payment, changed })
    }

    pub async fn refresh_completeness<S: ClosingStore>(
        &mut self,
        store: &S,
        studio_id: &StudioId,
        promise_id: &PromiseId,
    ) -> Result<SliceRefresh, GatewayError> {
        let promise = store.fetch_promise(studio_id, promise_id).await?;
        let fetched = RequiredData::from_promise(&promise);
        let changed = fetched != self.view.required;
        if changed {
            self.view.required = fetched;
        }
        Ok(SliceRefresh { slice: Slice::Completeness, changed })
    }

    pub async fn refresh_all<S: ClosingStore>(
        &mut self,
        store: &S,
        studio_id: &StudioId,
        promise_id: &PromiseId,
        quote_id: &QuoteId,
    ) -> Result<Vec<SliceRefresh>, GatewayError> {
        Ok(vec![
            self.refresh_condition(store, studio_id, quote_id).await?,
            self.refresh_contract(store, studio_id, quote_id).await?,
            self.refresh_payment(store, studio_id, quote_id).await?,
            self.refresh_completeness(store, studio_id, promise_id).await?,
        ])
    }

    /// Cancelling the closing clears every slice atomically.
    pub fn clear(&mut self) {
        self.view = ClosingView::default();
    }
}
