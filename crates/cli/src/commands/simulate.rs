use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use cierre_core::audit::InMemoryAuditSink;
use cierre_core::config::ReconcileConfig;
use cierre_core::{
    AdvanceKind, AuthorizationRequest, ClosingSession, CommercialCondition, ConditionId,
    FlowKind, InMemoryStudio, Payment, PaymentMethodId, Promise, PromiseId, PricingOverrides,
    Quote, QuoteId, QuoteStatus, StudioId, SystemClock, TemplateId,
};

use super::CommandResult;

/// Drives a complete scripted closing against the in-memory studio so the
/// whole pipeline can be exercised from a terminal.
pub fn run(flow: FlowKind, config: &ReconcileConfig) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("simulate", "runtime", error.to_string(), 3)
        }
    };

    match runtime.block_on(execute(flow, config)) {
        Ok(report) => CommandResult::success(
            "simulate",
            format!("closing simulated ({} steps)", report.steps.len()),
            Some(json!({
                "flow": match flow {
                    FlowKind::Digital => "digital",
                    FlowKind::StaffAssisted => "staff",
                },
                "steps": report.steps,
                "final_status": report.final_status,
                "event_id": report.event_id,
            })),
        ),
        Err(error) => CommandResult::failure("simulate", "simulation", format!("{error:#}"), 4),
    }
}

struct SimulationReport {
    steps: Vec<String>,
    final_status: String,
    event_id: String,
}

async fn execute(flow: FlowKind, config: &ReconcileConfig) -> Result<SimulationReport> {
    let studio_id = StudioId("S-demo".to_string());
    let promise_id = PromiseId("P-demo".to_string());
    let quote_id = QuoteId("C-demo".to_string());

    let studio = InMemoryStudio::new()
        .with_promise(Promise {
            id: promise_id.clone(),
            studio_id: studio_id.clone(),
            name: Some("Ana Torres".to_string()),
            phone: Some("555-0101".to_string()),
            email: Some("ana@example.com".to_string()),
            address: Some("Av. Reforma 10".to_string()),
            event_name: Some("XV Valeria".to_string()),
            event_location: Some("Salón Diamante".to_string()),
            event_date: NaiveDate::from_ymd_opt(2026, 11, 14),
        })
        .with_quote(Quote {
            id: quote_id.clone(),
            promise_id: promise_id.clone(),
            name: "Cotización demo".to_string(),
            base_price: Decimal::new(10_000, 0),
            flat_discount: Decimal::ZERO,
            status: QuoteStatus::EnCierre,
            selected_by_prospect: flow == FlowKind::Digital,
            evento_id: None,
            archived: false,
            created_at: Utc::now(),
        });

    let mut session = ClosingSession::open(
        Arc::new(studio),
        Arc::new(InMemoryAuditSink::default()),
        Arc::new(SystemClock),
        config,
        studio_id,
        promise_id,
        quote_id,
    )
    .await
    .context("opening the closing session")?;

    let mut steps = Vec::new();

    session
        .select_condition(CommercialCondition {
            id: ConditionId("cond-demo".to_string()),
            name: "Contado".to_string(),
            discount_pct: Decimal::new(10, 0),
            advance: AdvanceKind::Percentage { pct: Decimal::new(30, 0) },
        })
        .await
        .context("selecting the commercial condition")?;
    let breakdown = session.breakdown(&PricingOverrides::default());
    steps.push(format!(
        "condition selected: {} a pagar, anticipo {}",
        breakdown.price_after_discount, breakdown.advance_amount
    ));

    match flow {
        FlowKind::Digital => {
            session.request_signature().await.context("requesting the signature")?;
            steps.push("signature requested".to_string());

            session
                .request_contract(
                    TemplateId("T-demo".to_string()),
                    "contrato digital".to_string(),
                )
                .await
                .context("generating the contract")?;
            steps.push("contract generated".to_string());

            session.sign_contract(Utc::now()).await.context("signing the contract")?;
            steps.push("contract signed".to_string());
        }
        FlowKind::StaffAssisted => {
            session
                .confirm_payment(Payment {
                    concept: "Anticipo".to_string(),
                    amount: breakdown.advance_amount,
                    date: Utc::now().date_naive(),
                    method_id: PaymentMethodId("pm-demo".to_string()),
                })
                .await
                .context("confirming the advance payment")?;
            steps.push("advance payment confirmed".to_string());
        }
    }

    let outcome = session
        .authorize(AuthorizationRequest::default())
        .await
        .map_err(|failure| anyhow::anyhow!(failure.to_string()))
        .context("authorizing the quote")?;
    steps.push(format!("authorized, event {}", outcome.event_id.0));

    Ok(SimulationReport {
        steps,
        final_status: format!("{:?}", outcome.quote.status),
        event_id: outcome.event_id.0,
    })
}
