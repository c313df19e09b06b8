pub mod locks;
pub mod retry;

pub use locks::{LockKey, RefetchLocks};
pub use retry::RetryPolicy;

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregate::Slice;
use crate::clock::Clock;
use crate::domain::quote::{Quote, QuoteId};

/// Quote fields whose change always forces a targeted refetch.
const CRITICAL_QUOTE_FIELDS: [&str; 3] = ["status", "selected_by_prospect", "evento_id"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Quotes,
    ClosingConditions,
    ClosingContracts,
    ClosingPayments,
    Promises,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification from the external change feed. Not owned by this engine;
/// only consumed and classified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: String,
    pub table: ChangeTable,
    pub kind: ChangeKind,
    pub changed_fields: Vec<String>,
    /// New values keyed by field, when the feed carries them.
    #[serde(default)]
    pub new_values: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Must refetch the named slice; never a full-page reload.
    Critical(Slice),
    /// Patchable locally from the event payload.
    Cosmetic,
    /// Accumulated behind an explicit user "apply" action.
    ManualApply,
}

pub fn classify(event: &ChangeEvent) -> Classification {
    match event.table {
        ChangeTable::ClosingConditions => Classification::Critical(Slice::Condition),
        ChangeTable::ClosingContracts => Classification::Critical(Slice::Contract),
        ChangeTable::ClosingPayments => Classification::Critical(Slice::Payment),
        ChangeTable::Promises => Classification::Critical(Slice::Completeness),
        ChangeTable::Quotes => match event.kind {
            // A sibling quote appeared or went away: the user confirms.
            ChangeKind::Insert | ChangeKind::Delete => Classification::ManualApply,
            ChangeKind::Update => {
                let critical = event
                    .changed_fields
                    .iter()
                    .any(|field| CRITICAL_QUOTE_FIELDS.contains(&field.as_str()));
                if critical {
                    return Classification::Critical(Slice::Quote);
                }
                let payload_complete = event
                    .changed_fields
                    .iter()
                    .all(|field| event.new_values.contains_key(field));
                if payload_complete {
                    Classification::Cosmetic
                } else {
                    Classification::Critical(Slice::Quote)
                }
            }
        },
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No observable field actually changed; a no-op echo of our own write.
    Discarded,
    /// Patched locally from the payload; no round-trip.
    Patched { fields: Vec<String> },
    /// Lock acquired; the caller must refetch this slice and then call
    /// `refetch_finished`.
    RefetchNeeded(Slice),
    /// A refetch for this key is already in flight or cooling down.
    RefetchDropped(Slice),
    /// Counted behind the manual "apply" affordance.
    PendingApply,
}

/// Turns the change-event stream into minimal local updates: before-value
/// diffing, cosmetic patching, keyed refetch locking, and the manual-apply
/// counter.
pub struct Reconciler {
    key: LockKey,
    locks: RefetchLocks,
    quote_id: QuoteId,
    quote_state: Map<String, Value>,
    pending: u32,
    auto_applied: u32,
}

impl Reconciler {
    pub fn new(key: LockKey, cooldown: Duration, clock: Arc<dyn Clock>, quote: &Quote) -> Self {
        Self {
            key,
            locks: RefetchLocks::new(cooldown, clock),
            quote_id: quote.id.clone(),
            quote_state: snapshot(quote),
            pending: 0,
            auto_applied: 0,
        }
    }

    /// Refreshes the local before-value snapshot after a refetch applied.
    pub fn snapshot_quote(&mut self, quote: &Quote) {
        self.quote_state = snapshot(quote);
    }

    pub fn observe(&mut self, event: &ChangeEvent) -> ReconcileOutcome {
        // The echo diff and cosmetic patch only apply to the viewed quote.
        // Events for sibling quotes are counted as churn, never merged into
        // the local snapshot.
        if event.table == ChangeTable::Quotes && event.entity_id != self.quote_id.0 {
            self.pending += 1;
            return ReconcileOutcome::PendingApply;
        }

        if event.table == ChangeTable::Quotes
            && event.kind == ChangeKind::Update
            && self.is_noop_echo(event)
        {
            return ReconcileOutcome::Discarded;
        }

        match classify(event) {
            Classification::ManualApply => {
                self.pending += 1;
                ReconcileOutcome::PendingApply
            }
            Classification::Cosmetic => {
                let mut fields = Vec::new();
                for field in &event.changed_fields {
                    if let Some(value) = event.new_values.get(field) {
                        self.quote_state.insert(field.clone(), value.clone());
                        fields.push(field.clone());
                    }
                }
                self.auto_applied += 1;
                ReconcileOutcome::Patched { fields }
            }
            Classification::Critical(slice) => {
                if self.locks.begin(&self.key) {
                    ReconcileOutcome::RefetchNeeded(slice)
                } else {
                    ReconcileOutcome::RefetchDropped(slice)
                }
            }
        }
    }

    pub fn refetch_finished(&mut self) {
        self.locks.finish(&self.key);
    }

    /// Changes waiting behind the explicit "apply" action.
    pub fn pending_changes(&self) -> u32 {
        self.pending
    }

    /// Consumes the pending counter; the caller performs the full refresh.
    pub fn take_pending(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }

    /// Changes already patched locally, reported with a non-actionable
    /// indicator.
    pub fn auto_applied(&self) -> u32 {
        self.auto_applied
    }

    fn is_noop_echo(&self, event: &ChangeEvent) -> bool {
        if event.new_values.is_empty() {
            return false;
        }
        event.changed_fields.iter().all(|field| {
            match (event.new_values.get(field), self.quote_state.get(field)) {
                (Some(new_value), Some(current)) => new_value == current,
                _ => false,
            }
        })
    }
}

fn snapshot(quote: &Quote) -> Map<String, Value> {
    serde_json::to_value(quote)
        .ok()
        .and_then(|value| value.as_object().cloned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};

    use crate::aggregate::Slice;
    use crate::clock::ManualClock;
    use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
    use crate::domain::{PromiseId, StudioId};
    use crate::reconcile::locks::LockKey;

    use super::{
        classify, ChangeEvent, ChangeKind, ChangeTable, Classification, ReconcileOutcome,
        Reconciler,
    };

    fn quote() -> Quote {
        Quote {
            id: QuoteId("C-1".to_string()),
            promise_id: PromiseId("P-1".to_string()),
            name: "Boda jardín".to_string(),
            base_price: Decimal::new(10_000, 0),
            flat_discount: Decimal::ZERO,
            status: QuoteStatus::EnCierre,
            selected_by_prospect: false,
            evento_id: None,
            archived: false,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).single().expect("valid"),
        }
    }

    fn reconciler(clock: &ManualClock) -> Reconciler {
        Reconciler::new(
            LockKey {
                studio_id: StudioId("S-1".to_string()),
                promise_id: PromiseId("P-1".to_string()),
            },
            Duration::seconds(5),
            Arc::new(clock.clone()),
            &quote(),
        )
    }

    fn clock() -> ManualClock {
        ManualClock::at(Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).single().expect("valid"))
    }

    fn update(changed: &[(&str, Value)]) -> ChangeEvent {
        let mut new_values = Map::new();
        for (field, value) in changed {
            new_values.insert((*field).to_string(), value.clone());
        }
        ChangeEvent {
            entity_id: "C-1".to_string(),
            table: ChangeTable::Quotes,
            kind: ChangeKind::Update,
            changed_fields: changed.iter().map(|(field, _)| (*field).to_string()).collect(),
            new_values,
        }
    }

    #[test]
    fn echo_of_our_own_write_is_discarded() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = update(&[("name", json!("Boda jardín"))]);

        assert_eq!(reconciler.observe(&event), ReconcileOutcome::Discarded);
        assert_eq!(reconciler.auto_applied(), 0);
    }

    #[test]
    fn cosmetic_change_is_patched_without_a_round_trip() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = update(&[("name", json!("Boda playa"))]);

        assert_eq!(
            reconciler.observe(&event),
            ReconcileOutcome::Patched { fields: vec!["name".to_string()] }
        );
        assert_eq!(reconciler.auto_applied(), 1);

        // The patched value is now the before-value for the next event.
        let echo = update(&[("name", json!("Boda playa"))]);
        assert_eq!(reconciler.observe(&echo), ReconcileOutcome::Discarded);
    }

    #[test]
    fn cosmetic_change_without_payload_falls_back_to_refetch() {
        let event = ChangeEvent {
            entity_id: "C-1".to_string(),
            table: ChangeTable::Quotes,
            kind: ChangeKind::Update,
            changed_fields: vec!["name".to_string()],
            new_values: Map::new(),
        };
        assert_eq!(classify(&event), Classification::Critical(Slice::Quote));
    }

    #[test]
    fn status_change_forces_a_refetch() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = update(&[("status", json!("contract_signed"))]);

        assert_eq!(reconciler.observe(&event), ReconcileOutcome::RefetchNeeded(Slice::Quote));
    }

    #[test]
    fn duplicate_triggers_inside_the_cooldown_cause_one_refetch() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = update(&[("status", json!("contract_signed"))]);

        assert_eq!(reconciler.observe(&event), ReconcileOutcome::RefetchNeeded(Slice::Quote));
        // Same underlying mutation echoed by the feed while the first
        // refetch is still in flight.
        assert_eq!(reconciler.observe(&event), ReconcileOutcome::RefetchDropped(Slice::Quote));

        reconciler.refetch_finished();
        clock.advance(Duration::seconds(2));
        assert_eq!(reconciler.observe(&event), ReconcileOutcome::RefetchDropped(Slice::Quote));

        clock.advance(Duration::seconds(4));
        assert_eq!(reconciler.observe(&event), ReconcileOutcome::RefetchNeeded(Slice::Quote));
    }

    #[test]
    fn closing_side_table_events_refetch_their_slice() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = ChangeEvent {
            entity_id: "C-1".to_string(),
            table: ChangeTable::ClosingContracts,
            kind: ChangeKind::Update,
            changed_fields: vec!["version".to_string()],
            new_values: Map::new(),
        };

        assert_eq!(
            reconciler.observe(&event),
            ReconcileOutcome::RefetchNeeded(Slice::Contract)
        );
    }

    #[test]
    fn sibling_update_never_feeds_the_echo_diff() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);

        // A sibling quote is renamed to the value the viewed quote will be
        // renamed to next.
        let mut sibling = update(&[("name", json!("Boda playa"))]);
        sibling.entity_id = "C-2".to_string();
        assert_eq!(reconciler.observe(&sibling), ReconcileOutcome::PendingApply);
        assert_eq!(reconciler.pending_changes(), 1);

        // The real rename of the viewed quote must still patch; it is not an
        // echo just because a sibling carried the same value.
        let own = update(&[("name", json!("Boda playa"))]);
        assert_eq!(
            reconciler.observe(&own),
            ReconcileOutcome::Patched { fields: vec!["name".to_string()] }
        );
    }

    #[test]
    fn sibling_quote_churn_waits_for_manual_apply() {
        let clock = clock();
        let mut reconciler = reconciler(&clock);
        let event = ChangeEvent {
            entity_id: "C-2".to_string(),
            table: ChangeTable::Quotes,
            kind: ChangeKind::Insert,
            changed_fields: Vec::new(),
            new_values: Map::new(),
        };

        assert_eq!(reconciler.observe(&event), ReconcileOutcome::PendingApply);
        assert_eq!(reconciler.observe(&event), ReconcileOutcome::PendingApply);
        assert_eq!(reconciler.pending_changes(), 2);
        assert_eq!(reconciler.take_pending(), 2);
        assert_eq!(reconciler.pending_changes(), 0);
    }
}
