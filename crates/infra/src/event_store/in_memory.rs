//! Process-local event store backing the payroll ledgers.
//!
//! One stream per client entity holds that entity's bonuses, absences,
//! advances, absence requests and batch closures. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::RwLock;

use easypaies_core::{AggregateId, EntityId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Streams are isolated per entity first, then per aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    entity_id: EntityId,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store.
///
/// Appends are serialized by the write lock, so the version check and the
/// push happen atomically. Commutative ledger appends (bonuses, absences)
/// pass `ExpectedVersion::Any` and never conflict. Decisions and batch
/// closures pass `Exact` and fail with `Concurrency` when another writer got
/// there first; the dispatcher reloads and retries them.
///
/// Sequence numbers start at 1 in every stream. An entity whose ledger was
/// never written reads as an empty stream at version 0.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // One batch, one ledger stream.
        let entity_id = events[0].entity_id;
        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.entity_id != entity_id {
                return Err(EventStoreError::EntityIsolation(format!(
                    "batch contains multiple entity_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            entity_id,
            aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        // Sequence numbers continue the stream; export closes batches by them.
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                entity_id: e.entity_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        entity_id: EntityId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            entity_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(entity_id: EntityId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            entity_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.event".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn sequence_numbers_start_at_one() {
        let store = InMemoryEventStore::new();
        let entity = EntityId::new();
        let agg = entity.ledger_stream();

        let first = store
            .append(vec![event(entity, agg, "t"), event(entity, agg, "t")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), [1, 2]);

        let next = store.append(vec![event(entity, agg, "t")], ExpectedVersion::Any).unwrap();
        assert_eq!(next[0].sequence_number, 3);
        assert_eq!(store.load_stream(entity, agg).unwrap().len(), 3);
    }

    #[test]
    fn stale_exact_version_conflicts() {
        let store = InMemoryEventStore::new();
        let entity = EntityId::new();
        let agg = entity.ledger_stream();
        store.append(vec![event(entity, agg, "t")], ExpectedVersion::Exact(0)).unwrap();

        let err = store.append(vec![event(entity, agg, "t")], ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn streams_are_isolated_per_entity() {
        let store = InMemoryEventStore::new();
        let (a, b) = (EntityId::new(), EntityId::new());
        let agg = AggregateId::new();
        store.append(vec![event(a, agg, "t")], ExpectedVersion::Any).unwrap();

        assert!(store.load_stream(b, agg).unwrap().is_empty());
        let err = store
            .append(vec![event(a, agg, "t"), event(b, agg, "t")], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::EntityIsolation(_)));
    }

    #[test]
    fn aggregate_type_is_stable() {
        let store = InMemoryEventStore::new();
        let entity = EntityId::new();
        let agg = AggregateId::new();
        store.append(vec![event(entity, agg, "one")], ExpectedVersion::Any).unwrap();
        let err = store.append(vec![event(entity, agg, "two")], ExpectedVersion::Any).unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
