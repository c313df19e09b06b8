use cierre_core::{
    compute_breakdown, AdvanceKind, CommercialCondition, ConditionId, PricingOverrides,
};
use rust_decimal::Decimal;
use serde_json::json;

use super::CommandResult;

pub struct BreakdownInput {
    pub base: Decimal,
    pub discount_pct: Decimal,
    pub advance_pct: Option<Decimal>,
    pub advance_fixed: Option<Decimal>,
    pub negotiated: Option<Decimal>,
    pub courtesy: Decimal,
}

pub fn run(input: BreakdownInput) -> CommandResult {
    if input.advance_pct.is_some() && input.advance_fixed.is_some() {
        return CommandResult::failure(
            "breakdown",
            "invalid_arguments",
            "--advance-pct and --advance-fixed are mutually exclusive",
            2,
        );
    }

    let advance = match (input.advance_pct, input.advance_fixed) {
        (Some(pct), None) => AdvanceKind::Percentage { pct },
        (None, Some(amount)) => AdvanceKind::FixedAmount { amount },
        _ => AdvanceKind::None,
    };
    let condition = CommercialCondition {
        id: ConditionId("cli".to_string()),
        name: "cli".to_string(),
        discount_pct: input.discount_pct,
        advance,
    };
    let overrides = PricingOverrides {
        negotiated_price: input.negotiated,
        courtesy_total: input.courtesy,
    };

    let breakdown = compute_breakdown(input.base, Some(&condition), &overrides);
    let details = json!({
        "base": breakdown.base,
        "discount_pct": breakdown.discount_pct,
        "price_after_discount": breakdown.price_after_discount,
        "advance_amount": breakdown.advance_amount,
        "deferred_amount": breakdown.deferred_amount,
        "trace": breakdown.trace.steps.iter().map(|step| {
            json!({ "stage": step.stage, "detail": step.detail, "amount": step.amount })
        }).collect::<Vec<_>>(),
    });

    CommandResult::success(
        "breakdown",
        format!(
            "anticipo {} + diferido {} = {}",
            breakdown.advance_amount, breakdown.deferred_amount, breakdown.price_after_discount
        ),
        Some(details),
    )
}
