//! Employee record.
//!
//! One type covers both the HR form filled in by the client (`Draft`) and
//! the employee the payroll office actually manages (`Active`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use easypaies_core::{DomainError, DomainResult, EmployeeId, EntityId, Matricule, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Draft,
    #[default]
    Active,
}

/// Personal, contract and banking data, kept as free-form strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmployeeProfile {
    pub civility: Option<String>,
    pub maiden_name: Option<String>,
    pub birth_date: Option<String>,
    pub country: Option<String>,
    pub county: Option<String>,
    pub ss_number: Option<String>,
    pub house_number: Option<String>,
    pub street: Option<String>,
    pub address_supplement: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub mail: Option<String>,

    pub reason: Option<String>,
    pub contract_type: Option<String>,
    pub cdd_type: Option<String>,
    pub date_signed: Option<String>,
    pub date_begin: Option<String>,
    pub date_end: Option<String>,
    pub trial_period: Option<String>,
    pub weekly_time: Option<String>,
    pub draw_up: Option<String>,
    pub position_name: Option<String>,
    pub is_executive: Option<bool>,
    pub classification: Option<String>,
    pub salary: Option<String>,
    pub salary_value: Option<f64>,
    pub monthly_premium: Option<String>,
    pub premium_type: Option<String>,
    pub advantages: Option<String>,
    pub advantage_type: Option<String>,

    pub iban: Option<String>,
    pub bic: Option<String>,

    pub health_contract: Option<String>,
    pub alsace_moselle: Option<bool>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaySlots {
    pub morning: Option<String>,
    pub afternoon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklySchedule {
    pub monday: DaySlots,
    pub tuesday: DaySlots,
    pub wednesday: DaySlots,
    pub thursday: DaySlots,
    pub friday: DaySlots,
    pub saturday: DaySlots,
    pub sunday: DaySlots,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub departure_type: String,
    pub departure_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub entity: EntityId,
    pub matricule: Option<Matricule>,
    pub first_name: String,
    pub last_name: String,
    pub status: EmployeeStatus,
    pub active: bool,
    pub user: Option<UserId>,
    #[serde(flatten)]
    pub profile: EmployeeProfile,
    pub schedule: WeeklySchedule,
    pub documents: Vec<String>,
    pub departure: Option<Departure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a logged-in employee sees of their own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: EmployeeId,
    pub matricule: Option<Matricule>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub entity: EntityId,
}

impl Employee {
    fn build(
        entity: EntityId,
        first_name: &str,
        last_name: &str,
        status: EmployeeStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(DomainError::validation("first and last name are required"));
        }
        Ok(Self {
            id: EmployeeId::new(),
            entity,
            matricule: None,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            status,
            active: true,
            user: None,
            profile: EmployeeProfile::default(),
            schedule: WeeklySchedule::default(),
            documents: Vec::new(),
            departure: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Employee managed by the payroll office.
    pub fn hire(entity: EntityId, first_name: &str, last_name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::build(entity, first_name, last_name, EmployeeStatus::Active, now)
    }

    /// HR form submitted by the client, awaiting review.
    pub fn draft(entity: EntityId, first_name: &str, last_name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Self::build(entity, first_name, last_name, EmployeeStatus::Draft, now)
    }

    pub fn is_draft(&self) -> bool {
        self.status == EmployeeStatus::Draft
    }

    /// Draft -> Active, optionally assigning the matricule at the same time.
    pub fn promote(&mut self, matricule: Option<Matricule>, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_draft() {
            return Err(DomainError::invariant("only a draft employee can be promoted"));
        }
        if let Some(m) = matricule {
            self.matricule = Some(m);
        }
        self.status = EmployeeStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    pub fn record_departure(&mut self, departure: Departure, now: DateTime<Utc>) -> DomainResult<()> {
        if self.departure.is_some() {
            return Err(DomainError::invariant("departure already recorded"));
        }
        if departure.departure_type.trim().is_empty() {
            return Err(DomainError::validation("departure type is required"));
        }
        self.departure = Some(departure);
        self.active = false;
        self.updated_at = now;
        Ok(())
    }

    /// Matricule used for ledger rows. Employees without one cannot receive
    /// bonuses or absences.
    pub fn require_matricule(&self) -> DomainResult<&Matricule> {
        self.matricule.as_ref().ok_or_else(|| {
            DomainError::validation(format!("employee {} {} has no matricule", self.first_name, self.last_name))
        })
    }

    pub fn ensure_in_entity(&self, entity: EntityId) -> DomainResult<()> {
        if self.entity != entity {
            return Err(DomainError::validation("employee does not belong to this entity"));
        }
        Ok(())
    }

    pub fn summary(&self) -> EmployeeSummary {
        EmployeeSummary {
            id: self.id,
            matricule: self.matricule.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.profile.mail.clone(),
            entity: self.entity,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Matricules are unique per entity. `existing` is every employee of the
/// entity except the one being written.
pub fn ensure_unique_matricule<'a>(
    existing: impl IntoIterator<Item = &'a Employee>,
    candidate: &Matricule,
) -> DomainResult<()> {
    if existing
        .into_iter()
        .any(|e| e.matricule.as_ref() == Some(candidate))
    {
        return Err(DomainError::conflict(format!("matricule {candidate} is already used in this entity")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn names_are_required() {
        assert!(Employee::hire(EntityId::new(), "  ", "Martin", now()).is_err());
    }

    #[test]
    fn draft_promotes_once() {
        let mut e = Employee::draft(EntityId::new(), "Lea", "Martin", now()).unwrap();
        assert!(e.is_draft());
        e.promote(Some(Matricule::parse("M01").unwrap()), now()).unwrap();
        assert_eq!(e.status, EmployeeStatus::Active);
        assert_eq!(e.require_matricule().unwrap().as_str(), "M01");
        assert!(matches!(e.promote(None, now()), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn departure_deactivates() {
        let mut e = Employee::hire(EntityId::new(), "Lea", "Martin", now()).unwrap();
        let departure = Departure {
            departure_type: "démission".into(),
            departure_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        };
        e.record_departure(departure.clone(), now()).unwrap();
        assert!(!e.active);
        assert!(e.record_departure(departure, now()).is_err());
    }

    #[test]
    fn matricule_uniqueness() {
        let entity = EntityId::new();
        let mut a = Employee::hire(entity, "Lea", "Martin", now()).unwrap();
        a.matricule = Some(Matricule::parse("A").unwrap());
        let b = Employee::hire(entity, "Paul", "Petit", now()).unwrap();

        let taken = Matricule::parse("A").unwrap();
        let free = Matricule::parse("B").unwrap();
        assert!(matches!(ensure_unique_matricule([&a, &b], &taken), Err(DomainError::Conflict(_))));
        assert!(ensure_unique_matricule([&a, &b], &free).is_ok());
    }

    #[test]
    fn profile_fields_flatten() {
        let mut e = Employee::hire(EntityId::new(), "Lea", "Martin", now()).unwrap();
        e.profile.iban = Some("FR76".into());
        e.schedule.monday.morning = Some("08:00-12:00".into());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["iban"], "FR76");
        assert_eq!(json["schedule"]["monday"]["morning"], "08:00-12:00");
        assert_eq!(json["status"], "active");
    }
}
