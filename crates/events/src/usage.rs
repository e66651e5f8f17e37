//! Usage facts that feed the per-management activity counters.
//!
//! Business operations publish these on the bus instead of bumping counters
//! themselves; a projection turns them into the five counters stored on the
//! management record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use easypaies_core::{AggregateId, EntityId, ManagementId};

use crate::{Event, EventEnvelope};

pub const USAGE_AGGREGATE_TYPE: &str = "management.usage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFact {
    pub management_id: ManagementId,
    pub entity_id: EntityId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "fact", rename_all = "snake_case")]
pub enum UsageEvent {
    EmployeeAdded(UsageFact),
    AbsenceDeclared(UsageFact),
    EmployeeRemoved(UsageFact),
    SalaryElementsEntered(UsageFact),
    ContactMessageSent(UsageFact),
}

impl UsageEvent {
    pub fn fact(&self) -> &UsageFact {
        match self {
            UsageEvent::EmployeeAdded(f)
            | UsageEvent::AbsenceDeclared(f)
            | UsageEvent::EmployeeRemoved(f)
            | UsageEvent::SalaryElementsEntered(f)
            | UsageEvent::ContactMessageSent(f) => f,
        }
    }

    /// Wrap for publication. Usage facts are never stored in a stream, so the
    /// sequence number is 0 and the management id doubles as aggregate id.
    pub fn into_envelope(self) -> Result<EventEnvelope<serde_json::Value>, serde_json::Error> {
        let fact = self.fact().clone();
        let payload = serde_json::to_value(&self)?;
        Ok(EventEnvelope::new(
            Uuid::now_v7(),
            fact.entity_id,
            AggregateId::from_uuid(*fact.management_id.as_uuid()),
            USAGE_AGGREGATE_TYPE,
            0,
            payload,
        ))
    }
}

impl Event for UsageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UsageEvent::EmployeeAdded(_) => "management.usage.employee_added",
            UsageEvent::AbsenceDeclared(_) => "management.usage.absence_declared",
            UsageEvent::EmployeeRemoved(_) => "management.usage.employee_removed",
            UsageEvent::SalaryElementsEntered(_) => "management.usage.salary_elements_entered",
            UsageEvent::ContactMessageSent(_) => "management.usage.contact_message_sent",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.fact().occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_entity_and_payload() {
        let fact = UsageFact {
            management_id: ManagementId::new(),
            entity_id: EntityId::new(),
            occurred_at: Utc::now(),
        };
        let env = UsageEvent::AbsenceDeclared(fact.clone()).into_envelope().unwrap();

        assert_eq!(env.entity_id(), fact.entity_id);
        assert_eq!(env.aggregate_type(), USAGE_AGGREGATE_TYPE);
        let back: UsageEvent = serde_json::from_value(env.payload().clone()).unwrap();
        assert_eq!(back, UsageEvent::AbsenceDeclared(fact));
    }
}
