//! Payroll-service provider record: contact routing, usage counters and the
//! suspension cascade onto its entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easypaies_core::{DomainError, DomainResult, EntityId, ManagementId};

use crate::entity::Entity;

/// Which mailbox of a management a notification goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactCategory {
    General,
    NewCollaborator,
    DeleteCollaborator,
    AbsenceCollaborator,
    SalaryElement,
    GeneratePaySlip,
    Contact,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagementContacts {
    pub email: Option<String>,
    pub email_new_collaborator: Option<String>,
    pub email_delete_collaborator: Option<String>,
    pub email_absence_collaborator: Option<String>,
    pub email_salary_element: Option<String>,
    pub email_generate_pay_slip: Option<String>,
    pub email_contact: Option<String>,
}

impl ManagementContacts {
    /// Category mailbox, or `None` when it was never configured. Blank
    /// strings count as missing.
    pub fn address_for(&self, category: ContactCategory) -> Option<&str> {
        let slot = match category {
            ContactCategory::General => &self.email,
            ContactCategory::NewCollaborator => &self.email_new_collaborator,
            ContactCategory::DeleteCollaborator => &self.email_delete_collaborator,
            ContactCategory::AbsenceCollaborator => &self.email_absence_collaborator,
            ContactCategory::SalaryElement => &self.email_salary_element,
            ContactCategory::GeneratePaySlip => &self.email_generate_pay_slip,
            ContactCategory::Contact => &self.email_contact,
        };
        slot.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageCounter {
    NewEmployee,
    Absence,
    Remove,
    Salary,
    Contact,
}

/// Monotonic counters; nothing ever decrements them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub new_employee: u64,
    pub absence: u64,
    pub remove: u64,
    pub salary: u64,
    pub contact: u64,
}

impl UsageCounters {
    pub fn increment(&mut self, counter: UsageCounter) {
        let slot = match counter {
            UsageCounter::NewEmployee => &mut self.new_employee,
            UsageCounter::Absence => &mut self.absence,
            UsageCounter::Remove => &mut self.remove,
            UsageCounter::Salary => &mut self.salary,
            UsageCounter::Contact => &mut self.contact,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, counter: UsageCounter) -> u64 {
        match counter {
            UsageCounter::NewEmployee => self.new_employee,
            UsageCounter::Absence => self.absence,
            UsageCounter::Remove => self.remove,
            UsageCounter::Salary => self.salary,
            UsageCounter::Contact => self.contact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Management {
    pub id: ManagementId,
    pub name: String,
    pub logo: Option<String>,
    #[serde(flatten)]
    pub contacts: ManagementContacts,
    pub counters: UsageCounters,
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl Management {
    pub fn new(name: impl Into<String>, contacts: ManagementContacts, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("management name must not be empty"));
        }
        Ok(Self {
            id: ManagementId::new(),
            name,
            logo: None,
            contacts,
            counters: UsageCounters::default(),
            suspended: false,
            created_at: now,
        })
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.suspended {
            return Err(DomainError::suspended(format!("management {}", self.name)));
        }
        Ok(())
    }
}

/// Set `suspended` on the management and on every entity that references it.
///
/// Entities belonging to another management are left alone, so suspending
/// and then reactivating touches exactly the same set of records. Returns
/// the ids of the entities that were updated.
pub fn apply_suspension(management: &mut Management, entities: &mut [Entity], suspended: bool) -> Vec<EntityId> {
    management.suspended = suspended;
    entities
        .iter_mut()
        .filter(|e| e.management == management.id)
        .map(|e| {
            e.suspended = suspended;
            e.id
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn management() -> Management {
        Management::new(
            "Cabinet Durand",
            ManagementContacts {
                email: Some("contact@durand.fr".into()),
                email_generate_pay_slip: Some("  ".into()),
                ..ManagementContacts::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn blank_contact_counts_as_missing() {
        let m = management();
        assert_eq!(m.contacts.address_for(ContactCategory::General), Some("contact@durand.fr"));
        assert_eq!(m.contacts.address_for(ContactCategory::GeneratePaySlip), None);
        assert_eq!(m.contacts.address_for(ContactCategory::Contact), None);
    }

    #[test]
    fn counters_only_go_up() {
        let mut c = UsageCounters::default();
        c.increment(UsageCounter::Absence);
        c.increment(UsageCounter::Absence);
        c.increment(UsageCounter::Contact);
        assert_eq!(c.get(UsageCounter::Absence), 2);
        assert_eq!(c.get(UsageCounter::Contact), 1);
        assert_eq!(c.get(UsageCounter::Salary), 0);
    }

    #[test]
    fn contacts_flatten_into_management_json() {
        let json = serde_json::to_value(management()).unwrap();
        assert_eq!(json["email"], "contact@durand.fr");
        assert_eq!(json["counters"]["newEmployee"], 0);
    }

    proptest! {
        /// Suspension reaches every child entity and nothing else; reactivation
        /// restores the exact prior state when everything started active.
        #[test]
        fn suspension_cascade_is_reversible(owned in 0usize..6, foreign in 0usize..6) {
            let now = Utc::now();
            let mut m = management();
            let other = ManagementId::new();
            let mut entities: Vec<Entity> = (0..owned)
                .map(|i| Entity::new(format!("own-{i}"), m.id, now).unwrap())
                .chain((0..foreign).map(|i| Entity::new(format!("other-{i}"), other, now).unwrap()))
                .collect();
            let before = entities.clone();

            let touched = apply_suspension(&mut m, &mut entities, true);
            prop_assert_eq!(touched.len(), owned);
            prop_assert!(m.suspended);
            for e in &entities {
                prop_assert_eq!(e.suspended, e.management == m.id);
            }

            let restored = apply_suspension(&mut m, &mut entities, false);
            prop_assert_eq!(restored, touched);
            prop_assert!(!m.suspended);
            prop_assert_eq!(entities, before);
        }
    }
}
