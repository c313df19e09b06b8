use cierre_core::config::ReconcileConfig;
use cierre_core::FlowKind;
use rust_decimal::Decimal;
use serde_json::Value;

use cierre_cli::commands::{breakdown, simulate};

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn config() -> ReconcileConfig {
    ReconcileConfig { cooldown_secs: 5, poll_interval_secs: 1, max_poll_attempts: 3 }
}

#[test]
fn breakdown_reports_the_three_way_split() {
    let result = breakdown::run(breakdown::BreakdownInput {
        base: Decimal::new(10_000, 0),
        discount_pct: Decimal::new(10, 0),
        advance_pct: Some(Decimal::new(30, 0)),
        advance_fixed: None,
        negotiated: None,
        courtesy: Decimal::ZERO,
    });
    assert_eq!(result.exit_code, 0, "expected a successful breakdown");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "breakdown");
    assert_eq!(payload["status"], "ok");
    assert_eq!(amount(&payload, "price_after_discount"), Decimal::new(9_000, 0));
    assert_eq!(amount(&payload, "advance_amount"), Decimal::new(2_700, 0));
    assert_eq!(amount(&payload, "deferred_amount"), Decimal::new(6_300, 0));
}

fn amount(payload: &Value, field: &str) -> Decimal {
    payload["details"][field]
        .as_str()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_else(|| panic!("field {field} should hold a decimal amount"))
}

#[test]
fn breakdown_rejects_conflicting_advance_arguments() {
    let result = breakdown::run(breakdown::BreakdownInput {
        base: Decimal::new(10_000, 0),
        discount_pct: Decimal::ZERO,
        advance_pct: Some(Decimal::new(30, 0)),
        advance_fixed: Some(Decimal::new(1_000, 0)),
        negotiated: None,
        courtesy: Decimal::ZERO,
    });
    assert_eq!(result.exit_code, 2, "expected an argument validation failure");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "invalid_arguments");
}

#[test]
fn staff_simulation_authorizes_the_quote() {
    let result = simulate::run(FlowKind::StaffAssisted, &config());
    assert_eq!(result.exit_code, 0, "expected a successful staff simulation");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "simulate");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["details"]["flow"], "staff");
    assert_eq!(payload["details"]["final_status"], "Autorizada");
    assert!(payload["details"]["event_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn digital_simulation_walks_the_signature_stages() {
    let result = simulate::run(FlowKind::Digital, &config());
    assert_eq!(result.exit_code, 0, "expected a successful digital simulation");

    let payload = parse_payload(&result.output);
    assert_eq!(payload["details"]["flow"], "digital");
    assert_eq!(payload["details"]["final_status"], "Autorizada");

    let steps: Vec<String> = payload["details"]["steps"]
        .as_array()
        .expect("steps array")
        .iter()
        .filter_map(|step| step.as_str().map(str::to_string))
        .collect();
    assert!(steps.iter().any(|step| step.contains("signature requested")));
    assert!(steps.iter().any(|step| step.contains("contract signed")));
}
