//! Per-management usage counters, built from `UsageEvent`s on the bus.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use uuid::Uuid;

use easypaies_core::ManagementId;
use easypaies_events::{EventEnvelope, USAGE_AGGREGATE_TYPE, UsageEvent};
use easypaies_payroll::{Management, UsageCounter};

use crate::record_store::RecordStore;

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

/// Event ids remembered for deduplication. Redeliveries arrive shortly
/// after the original, so a window of recent ids is enough.
pub const DEDUP_WINDOW: usize = 4096;

/// The last `capacity` event ids, oldest evicted first.
#[derive(Debug)]
struct RecentIds {
    order: VecDeque<Uuid>,
    ids: HashSet<Uuid>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// `false` when `id` is still in the window.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Bumps the counter matching each usage fact on the owning management.
///
/// Delivery is at-least-once, so envelopes are deduplicated by `event_id`
/// over the last [`DEDUP_WINDOW`] deliveries.
pub struct UsageCountersProjection<S> {
    store: S,
    seen: Mutex<RecentIds>,
}

impl<S> UsageCountersProjection<S>
where
    S: RecordStore<ManagementId, Management>,
{
    pub fn new(store: S) -> Self {
        Self::with_window(store, DEDUP_WINDOW)
    }

    pub fn with_window(store: S, capacity: usize) -> Self {
        Self {
            store,
            seen: Mutex::new(RecentIds::new(capacity)),
        }
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<serde_json::Value>) -> Result<(), anyhow::Error> {
        if envelope.aggregate_type() != USAGE_AGGREGATE_TYPE {
            return Ok(());
        }

        {
            let mut seen = self
                .seen
                .lock()
                .map_err(|_| anyhow::anyhow!("usage projection dedup set poisoned"))?;
            if !seen.insert(envelope.event_id()) {
                return Ok(());
            }
        }

        let event: UsageEvent = serde_json::from_value(envelope.payload().clone())?;
        let counter = counter_for(&event);
        let management_id = event.fact().management_id;

        let updated = self
            .store
            .update(&management_id, &mut |m| m.counters.increment(counter));
        if updated.is_none() {
            tracing::debug!(%management_id, ?counter, "usage fact for unknown management ignored");
        }
        Ok(())
    }
}

fn counter_for(event: &UsageEvent) -> UsageCounter {
    match event {
        UsageEvent::EmployeeAdded(_) => UsageCounter::NewEmployee,
        UsageEvent::AbsenceDeclared(_) => UsageCounter::Absence,
        UsageEvent::EmployeeRemoved(_) => UsageCounter::Remove,
        UsageEvent::SalaryElementsEntered(_) => UsageCounter::Salary,
        UsageEvent::ContactMessageSent(_) => UsageCounter::Contact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use easypaies_core::EntityId;
    use easypaies_events::UsageFact;
    use easypaies_payroll::ManagementContacts;

    use crate::record_store::InMemoryRecordStore;

    fn setup() -> (Arc<InMemoryRecordStore<ManagementId, Management>>, Management) {
        let store = Arc::new(InMemoryRecordStore::new());
        let m = Management::new("Cabinet", ManagementContacts::default(), Utc::now()).unwrap();
        store.upsert(m.id, m.clone());
        (store, m)
    }

    fn fact(m: &Management) -> UsageFact {
        UsageFact {
            management_id: m.id,
            entity_id: EntityId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn each_fact_bumps_its_counter() {
        let (store, m) = setup();
        let projection = UsageCountersProjection::new(Arc::clone(&store));

        for event in [
            UsageEvent::EmployeeAdded(fact(&m)),
            UsageEvent::AbsenceDeclared(fact(&m)),
            UsageEvent::AbsenceDeclared(fact(&m)),
            UsageEvent::SalaryElementsEntered(fact(&m)),
        ] {
            projection.apply_envelope(&event.into_envelope().unwrap()).unwrap();
        }

        let counters = store.get(&m.id).unwrap().counters;
        assert_eq!(counters.new_employee, 1);
        assert_eq!(counters.absence, 2);
        assert_eq!(counters.salary, 1);
        assert_eq!(counters.remove, 0);
    }

    #[test]
    fn redelivery_is_counted_once() {
        let (store, m) = setup();
        let projection = UsageCountersProjection::new(Arc::clone(&store));
        let env = UsageEvent::ContactMessageSent(fact(&m)).into_envelope().unwrap();

        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        assert_eq!(store.get(&m.id).unwrap().counters.contact, 1);
    }

    #[test]
    fn dedup_window_stays_bounded() {
        let (store, m) = setup();
        let projection = UsageCountersProjection::with_window(Arc::clone(&store), 3);
        let first = UsageEvent::ContactMessageSent(fact(&m)).into_envelope().unwrap();
        projection.apply_envelope(&first).unwrap();
        for _ in 0..10 {
            let env = UsageEvent::ContactMessageSent(fact(&m)).into_envelope().unwrap();
            projection.apply_envelope(&env).unwrap();
        }

        assert_eq!(projection.seen.lock().unwrap().len(), 3);
        assert_eq!(store.get(&m.id).unwrap().counters.contact, 11);

        // Evicted from the window, so a very late redelivery counts again.
        projection.apply_envelope(&first).unwrap();
        assert_eq!(store.get(&m.id).unwrap().counters.contact, 12);
    }

    #[test]
    fn other_aggregates_are_ignored() {
        let (store, m) = setup();
        let projection = UsageCountersProjection::new(Arc::clone(&store));
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            EntityId::new(),
            easypaies_core::AggregateId::new(),
            "payroll.ledger",
            1,
            serde_json::json!({"type": "bonus_recorded"}),
        );
        projection.apply_envelope(&env).unwrap();
        assert_eq!(store.get(&m.id).unwrap().counters, Default::default());
    }
}
