use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use easypaies_core::{AggregateId, EntityId, ExpectedVersion};
use std::sync::Arc;

/// An event ready to be appended (no sequence number yet).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`],
/// which captures the event metadata needed to deserialize it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub entity_id: EntityId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its position in the stream.
///
/// Sequence numbers are per stream (`entity_id` + `aggregate_id`), start at 1
/// and have no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub entity_id: EntityId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Entity-scoped envelope for publication on the bus.
    pub fn to_envelope(&self) -> easypaies_events::EventEnvelope<JsonValue> {
        easypaies_events::EventEnvelope::new(
            self.event_id,
            self.entity_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("entity isolation violation: {0}")]
    EntityIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, entity-scoped event store.
///
/// One stream per aggregate instance, keyed by `(entity_id, aggregate_id)`.
///
/// `append` must:
/// - reject batches that mix entities, aggregates or aggregate types
/// - check `expected_version` against the current stream version under the
///   same lock that performs the write
/// - assign `current_version + 1, + 2, ...` to the batch
/// - persist the whole batch or nothing
///
/// With [`ExpectedVersion::Any`] the check always passes, which makes append
/// an atomic positional push: concurrent appends never conflict and each one
/// gets its own sequence number.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Full stream in sequence order; empty when it does not exist yet.
    fn load_stream(&self, entity_id: EntityId, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, entity_id: EntityId, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(entity_id, aggregate_id)
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        entity_id: EntityId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: easypaies_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            entity_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
