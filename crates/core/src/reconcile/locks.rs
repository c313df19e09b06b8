use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::domain::{PromiseId, StudioId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    pub studio_id: StudioId,
    pub promise_id: PromiseId,
}

#[derive(Clone, Copy, Debug, Default)]
struct LockSlot {
    in_flight: bool,
    cooldown_until: Option<DateTime<Utc>>,
}

/// Keyed mutual-exclusion registry for refetches. While a refetch for a key
/// is in flight, or inside its cool-down window after completion, further
/// triggers for that key are dropped rather than queued. The public page and
/// the realtime feed fire near-simultaneous triggers for a single mutation;
/// duplicate fetches would race and could apply a stale response.
pub struct RefetchLocks {
    slots: HashMap<LockKey, LockSlot>,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl RefetchLocks {
    pub fn new(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { slots: HashMap::new(), cooldown, clock }
    }

    /// Attempts to start a refetch. Returns false when the trigger must be
    /// dropped.
    pub fn begin(&mut self, key: &LockKey) -> bool {
        let now = self.clock.now();
        let slot = self.slots.entry(key.clone()).or_default();
        if slot.in_flight {
            return false;
        }
        if slot.cooldown_until.is_some_and(|until| now < until) {
            return false;
        }
        slot.in_flight = true;
        true
    }

    /// Marks the in-flight refetch settled and opens the cool-down window.
    pub fn finish(&mut self, key: &LockKey) {
        let now = self.clock.now();
        let slot = self.slots.entry(key.clone()).or_default();
        slot.in_flight = false;
        slot.cooldown_until = Some(now + self.cooldown);
    }

    pub fn is_held(&self, key: &LockKey) -> bool {
        let now = self.clock.now();
        self.slots.get(key).is_some_and(|slot| {
            slot.in_flight || slot.cooldown_until.is_some_and(|until| now < until)
        })
    }
}
