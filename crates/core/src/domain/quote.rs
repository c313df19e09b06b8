use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{EventId, PromiseId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Lifecycle of a quote through the closing pipeline. `Autorizada` is
/// terminal; `Pendiente` is also where a cancelled closing lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pendiente,
    EnCierre,
    ContractPending,
    ContractGenerated,
    ContractSigned,
    Aprobada,
    Autorizada,
}

impl QuoteStatus {
    /// States in which a closing record exists for the quote.
    pub fn in_closing(&self) -> bool {
        !matches!(self, Self::Pendiente | Self::Autorizada)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub promise_id: PromiseId,
    pub name: String,
    pub base_price: Decimal,
    pub flat_discount: Decimal,
    pub status: QuoteStatus,
    pub selected_by_prospect: bool,
    pub evento_id: Option<EventId>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        use QuoteStatus::{
            Aprobada, Autorizada, ContractGenerated, ContractPending, ContractSigned, EnCierre,
            Pendiente,
        };

        matches!(
            (self.status, next),
            (Pendiente, EnCierre)
                | (EnCierre, Pendiente)
                | (EnCierre, ContractPending)
                | (EnCierre, ContractGenerated)
                | (EnCierre, Aprobada)
                | (EnCierre, Autorizada)
                | (ContractPending, ContractGenerated)
                | (ContractPending, Pendiente)
                | (ContractGenerated, ContractSigned)
                | (ContractGenerated, Pendiente)
                | (ContractSigned, Autorizada)
                | (Aprobada, Autorizada)
        )
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    /// `evento_id` is set exactly when the quote has been authorized and the
    /// event-creation side effect completed.
    pub fn event_invariant_holds(&self) -> bool {
        self.evento_id.is_some() == (self.status == QuoteStatus::Autorizada)
    }

    /// Base price after the quote-level flat discount, floored at zero.
    /// The commercial condition's percentage applies on top of this.
    pub fn effective_base(&self) -> Decimal {
        (self.base_price - self.flat_discount).max(Decimal::ZERO)
    }
}
