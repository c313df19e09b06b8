use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::closing::{AdvanceKind, CommercialCondition};
use crate::domain::quote::Quote;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn push(&mut self, stage: &str, detail: impl Into<String>, amount: Decimal) {
        self.steps.push(PricingTraceStep {
            stage: stage.to_string(),
            detail: detail.into(),
            amount,
        });
    }
}

/// Negotiated/courtesy adjustments applied on top of the commercial
/// condition. A negotiated price > 0 is a hard override of the discounted
/// price; courtesy items only subtract when no price was negotiated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingOverrides {
    pub negotiated_price: Option<Decimal>,
    pub courtesy_total: Decimal,
}

/// Ephemeral breakdown; recomputed on every read, never persisted. The same
/// computation runs on the staff view and the public prospect view, so it
/// must be a pure function of its inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base: Decimal,
    pub discount_pct: Decimal,
    pub price_after_discount: Decimal,
    pub advance: AdvanceKind,
    pub advance_amount: Decimal,
    pub deferred_amount: Decimal,
    pub trace: PricingTrace,
}

pub trait PricingEngine: Send + Sync {
    fn breakdown(
        &self,
        quote: &Quote,
        condition: Option<&CommercialCondition>,
        overrides: &PricingOverrides,
    ) -> PriceBreakdown;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn breakdown(
        &self,
        quote: &Quote,
        condition: Option<&CommercialCondition>,
        overrides: &PricingOverrides,
    ) -> PriceBreakdown {
        compute_breakdown(quote.effective_base(), condition, overrides)
    }
}

pub fn compute_breakdown(
    base: Decimal,
    condition: Option<&CommercialCondition>,
    overrides: &PricingOverrides,
) -> PriceBreakdown {
    let hundred = Decimal::ONE_HUNDRED;
    let mut trace = PricingTrace::default();
    trace.push("base", "precio base", base);

    let discount_pct = condition.map(|c| c.discount_pct).unwrap_or(Decimal::ZERO);
    let discounted = base * (hundred - discount_pct) / hundred;
    if discount_pct > Decimal::ZERO {
        trace.push("discount", format!("descuento {discount_pct}%"), discounted);
    }

    let negotiated = overrides.negotiated_price.filter(|price| *price > Decimal::ZERO);
    let price_after_discount = match negotiated {
        Some(price) => {
            trace.push("negotiated", "precio negociado reemplaza el descuento", price);
            price
        }
        None => {
            let mut price = discounted;
            if overrides.courtesy_total > Decimal::ZERO {
                price = (price - overrides.courtesy_total).max(Decimal::ZERO);
                trace.push(
                    "courtesy",
                    format!("cortesías -{}", overrides.courtesy_total),
                    price,
                );
            }
            price
        }
    };

    let advance = condition.map(|c| c.advance.clone()).unwrap_or(AdvanceKind::None);
    let advance_amount = match &advance {
        AdvanceKind::None => Decimal::ZERO,
        // Both arms clamp: an advance can never exceed the payable price.
        AdvanceKind::Percentage { pct } => {
            (price_after_discount * *pct / hundred).min(price_after_discount)
        }
        AdvanceKind::FixedAmount { amount } => (*amount).min(price_after_discount),
    };
    if advance_amount > Decimal::ZERO {
        trace.push("advance", "anticipo", advance_amount);
    }

    let deferred_amount = (price_after_discount - advance_amount).max(Decimal::ZERO);
    trace.push("deferred", "diferido", deferred_amount);

    PriceBreakdown {
        base,
        discount_pct,
        price_after_discount,
        advance,
        advance_amount,
        deferred_amount,
        trace,
    }
}
