//! The unit that travels on the bus.
//!
//! Two kinds of payload are wrapped here. Payroll ledger events are stored
//! first and carry their position in the entity's ledger stream. Usage facts
//! (`management.usage`) are published straight to the bus for the per-management
//! counters and are never stored, so their sequence number stays 0.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use easypaies_core::{AggregateId, EntityId};

/// Event plus stream metadata, as published on the bus.
///
/// `entity_id` is the partition key: every stream belongs to exactly one
/// client entity (a company whose payroll is prepared). Each entity owns one
/// ledger stream, whose aggregate id is derived from the entity id.
/// `sequence_number` is the position inside that stream. Export uses it as
/// the batch boundary. Bus-only usage facts use 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    entity_id: EntityId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        entity_id: EntityId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            entity_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    /// UUID v7 assigned at publication. Consumers deduplicate redeliveries
    /// on it.
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// `payroll.ledger` or `management.usage`. Projections filter on it
    /// before decoding the payload.
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use easypaies_core::ManagementId;

    use super::*;
    use crate::usage::{USAGE_AGGREGATE_TYPE, UsageEvent, UsageFact};

    #[test]
    fn usage_facts_are_bus_only_and_partitioned_by_entity() {
        let fact = UsageFact {
            management_id: ManagementId::new(),
            entity_id: EntityId::new(),
            occurred_at: Utc::now(),
        };
        let first = UsageEvent::AbsenceDeclared(fact.clone()).into_envelope().unwrap();
        let again = UsageEvent::AbsenceDeclared(fact.clone()).into_envelope().unwrap();

        assert_eq!(first.sequence_number(), 0);
        assert_eq!(first.aggregate_type(), USAGE_AGGREGATE_TYPE);
        assert_eq!(first.entity_id(), fact.entity_id);
        assert_ne!(first.event_id(), again.event_id());
    }
}
