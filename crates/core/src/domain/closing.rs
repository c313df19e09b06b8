use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::promise::RequiredData;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(pub String);

/// How the advance payment of a commercial condition is expressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdvanceKind {
    None,
    Percentage { pct: Decimal },
    FixedAmount { amount: Decimal },
}

/// Denormalized snapshot of the condition selected for a quote. The quote
/// keeps its own copy so later edits to the catalog do not move the price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommercialCondition {
    pub id: ConditionId,
    pub name: String,
    pub discount_pct: Decimal,
    pub advance: AdvanceKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub template_id: TemplateId,
    pub content: String,
    pub version: u32,
    pub signed_at: Option<DateTime<Utc>>,
}

impl Contract {
    pub fn new(template_id: TemplateId, content: impl Into<String>) -> Self {
        Self { template_id, content: content.into(), version: 1, signed_at: None }
    }

    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }

    /// Replaces the rendered body and bumps the version. Regeneration after
    /// signature would diverge from what was signed, so it is rejected.
    pub fn regenerate(&mut self, content: impl Into<String>) -> Result<(), DomainError> {
        if self.is_signed() {
            return Err(DomainError::InvariantViolation(
                "signed contracts cannot be regenerated".to_string(),
            ));
        }
        self.content = content.into();
        self.version += 1;
        Ok(())
    }

    /// `signed_at` is immutable once set; re-signing is not permitted.
    pub fn sign(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.is_signed() {
            return Err(DomainError::InvariantViolation(
                "contract is already signed".to_string(),
            ));
        }
        self.signed_at = Some(at);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub concept: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub method_id: PaymentMethodId,
}

/// The side-record attached 1:1 to a quote while it is in the closing
/// pipeline. Each slice loads and mutates independently.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosingRecord {
    pub condition: Option<CommercialCondition>,
    pub contract: Option<Contract>,
    pub payment: Option<Payment>,
    pub required: RequiredData,
}
