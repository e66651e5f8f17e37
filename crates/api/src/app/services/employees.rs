//! Employee records, HR forms (drafts) and the notification-only employee
//! operations (salary validation, declared absences).

use chrono::Utc;
use serde_json::{Map, Value};

use easypaies_auth::Principal;
use easypaies_core::{EmployeeId, EntityId, Matricule};
use easypaies_events::UsageEvent;
use easypaies_infra::RecordStore;
use easypaies_infra::notify::{AbsenceDetails, DeliveryReport, Notification};
use easypaies_infra::storage::{MAX_DOCUMENTS, Upload};
use easypaies_payroll::dates::{ensure_ordered, parse_day};
use easypaies_payroll::{
    ContactCategory, Departure, Employee, EmployeeProfile, EmployeeStatus, Entity, ensure_unique_matricule,
};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

/// Lay `patch` over the serialized profile. Keys the profile does not know
/// are dropped by deserialization.
fn patch_profile(profile: &EmployeeProfile, patch: Map<String, Value>) -> Result<EmployeeProfile, AppError> {
    let mut current = serde_json::to_value(profile)?;
    if let Value::Object(fields) = &mut current {
        fields.extend(patch);
    }
    Ok(serde_json::from_value(current)?)
}

impl AppServices {
    fn check_matricule(&self, entity: EntityId, raw: &str, except: Option<EmployeeId>) -> Result<Matricule, AppError> {
        let matricule = Matricule::parse(raw)?;
        let siblings = self.employees.filter(&|e| e.entity == entity && Some(e.id) != except);
        ensure_unique_matricule(&siblings, &matricule)?;
        Ok(matricule)
    }

    /// Write `employee`, refusing when another employee of the same entity
    /// holds its matricule. Check and write happen under the store lock, so
    /// concurrent writers cannot both pass.
    pub(super) fn store_employee(&self, employee: &Employee, is_new: bool) -> Result<(), AppError> {
        let conflicts = |other: &Employee| {
            other.id != employee.id
                && other.entity == employee.entity
                && employee.matricule.is_some()
                && other.matricule == employee.matricule
        };
        let stored = if is_new {
            self.employees.insert_unique(employee.id, employee.clone(), &conflicts)
        } else {
            self.employees.replace_unique(employee.id, employee.clone(), &conflicts)
        };
        if !stored {
            let matricule = employee.matricule.as_ref().map(ToString::to_string).unwrap_or_default();
            return Err(AppError::Conflict(format!("matricule {matricule} is already used in this entity")));
        }
        Ok(())
    }

    pub fn list_employees(&self, user: &CurrentUser, status: EmployeeStatus) -> Vec<Employee> {
        let visible: Vec<EntityId> = self.visible_entities(user).into_iter().map(|e| e.id).collect();
        let own = match user.principal() {
            Principal::Employee { employee, .. } => Some(employee),
            _ => None,
        };
        self.employees.filter(&|e| {
            e.status == status
                && visible.contains(&e.entity)
                && match own {
                    Some(own) => own == Some(e.id),
                    None => true,
                }
        })
    }

    pub fn employee_with_status(
        &self,
        user: &CurrentUser,
        id: EmployeeId,
        status: EmployeeStatus,
    ) -> Result<Employee, AppError> {
        self.employee_in_scope(user, id)
            .ok()
            .filter(|e| e.status == status)
            .ok_or_else(|| AppError::not_found("No employee found with that ID"))
    }

    /// Create an employee (or an HR form when `draft`) in `entity_id`, with
    /// its uploaded documents.
    pub async fn create_employee(
        &self,
        user: &CurrentUser,
        entity_id: EntityId,
        input: dto::EmployeeInput,
        documents: Vec<Upload>,
        draft: bool,
    ) -> Result<Employee, AppError> {
        let entity = self.entity_in_scope(user, entity_id)?;
        let management = self.ensure_entity_active(&entity)?;

        let now = Utc::now();
        let mut employee = if draft {
            Employee::draft(entity.id, &input.first_name, &input.last_name, now)?
        } else {
            Employee::hire(entity.id, &input.first_name, &input.last_name, now)?
        };
        if let Some(raw) = input.matricule.as_deref().filter(|m| !m.trim().is_empty()) {
            employee.matricule = Some(self.check_matricule(entity.id, raw, None)?);
        }
        employee.profile = input.profile;
        employee.schedule = input.schedule;
        employee.documents = self
            .documents
            .store_all(&entity.id.to_string(), &documents, MAX_DOCUMENTS)
            .await?;

        self.store_employee(&employee, true)?;
        tracing::info!(entity_id = %entity.id, employee_id = %employee.id, draft, "employee created");

        self.record_usage(UsageEvent::EmployeeAdded, &entity);
        self.notify_management(
            &management,
            ContactCategory::NewCollaborator,
            &Notification::NewEmployee {
                entity_name: entity.name.clone(),
                employee_name: employee.full_name(),
                documents: employee.documents.clone(),
            },
        )
        .await;
        Ok(employee)
    }

    /// Payroll-office shortcut: name and matricule only, no notification.
    pub fn create_short_employee(&self, user: &CurrentUser, body: dto::ShortEmployeeRequest) -> Result<Employee, AppError> {
        let entity = self.entity_in_scope(user, body.entity)?;
        let mut employee = Employee::hire(entity.id, &body.first_name, &body.last_name, Utc::now())?;
        if let Some(raw) = body.matricule.as_deref().filter(|m| !m.trim().is_empty()) {
            employee.matricule = Some(self.check_matricule(entity.id, raw, None)?);
        }
        self.store_employee(&employee, true)?;
        Ok(employee)
    }

    /// Patch an employee. A `departureType` records the departure, mails the
    /// payroll office and counts a removal.
    pub async fn update_employee(
        &self,
        user: &CurrentUser,
        id: EmployeeId,
        status: EmployeeStatus,
        body: dto::UpdateEmployeeRequest,
    ) -> Result<Employee, AppError> {
        let mut employee = self.employee_with_status(user, id, status)?;
        let entity = self.find_entity(employee.entity)?;
        let management = self.ensure_entity_active(&entity)?;
        let now = Utc::now();

        if let Some(v) = &body.first_name {
            employee.first_name = v.trim().to_string();
        }
        if let Some(v) = &body.last_name {
            employee.last_name = v.trim().to_string();
        }
        if let Some(raw) = body.matricule.as_deref() {
            employee.matricule = Some(self.check_matricule(entity.id, raw, Some(employee.id))?);
        }
        if let Some(schedule) = body.schedule {
            employee.schedule = schedule;
        }
        if !body.profile.is_empty() {
            employee.profile = patch_profile(&employee.profile, body.profile)?;
        }

        let departure = match body.departure_type {
            Some(departure_type) => {
                let departure_date = match body.departure_date.as_deref() {
                    Some(raw) => parse_day(raw)?,
                    None => now.date_naive(),
                };
                let departure = Departure {
                    departure_type,
                    departure_date,
                };
                employee.record_departure(departure.clone(), now)?;
                Some(departure)
            }
            None => None,
        };
        employee.updated_at = now;
        self.store_employee(&employee, false)?;

        if let Some(departure) = departure {
            tracing::info!(entity_id = %entity.id, employee_id = %employee.id, "departure recorded");
            self.record_usage(UsageEvent::EmployeeRemoved, &entity);
            self.notify_management(
                &management,
                ContactCategory::DeleteCollaborator,
                &Notification::EmployeeDeparture {
                    entity_name: entity.name.clone(),
                    employee_name: employee.full_name(),
                    matricule: employee.matricule.as_ref().map(ToString::to_string),
                    departure_type: departure.departure_type,
                    departure_date: departure.departure_date,
                },
            )
            .await;
        }
        Ok(employee)
    }

    pub fn delete_employee(&self, user: &CurrentUser, id: EmployeeId, status: EmployeeStatus) -> Result<(), AppError> {
        let employee = self.employee_with_status(user, id, status)?;
        self.employees.remove(&employee.id);
        if let Some(user_id) = employee.user {
            self.users.update(&user_id, &mut |u| u.employee_id = None);
        }
        tracing::info!(employee_id = %id, "employee deleted");
        Ok(())
    }

    /// HR form reviewed by the payroll office becomes an active employee.
    pub fn promote_employee(&self, user: &CurrentUser, id: EmployeeId, body: dto::PromoteRequest) -> Result<Employee, AppError> {
        let mut employee = self.employee_with_status(user, id, EmployeeStatus::Draft)?;
        let matricule = match body.matricule.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(raw) => Some(self.check_matricule(employee.entity, raw, Some(employee.id))?),
            None => None,
        };
        employee.promote(matricule, Utc::now())?;
        self.store_employee(&employee, false)?;
        tracing::info!(employee_id = %id, "employee promoted");
        Ok(employee)
    }

    /// Client confirms the month's salaries; mailed to the salary mailbox.
    pub async fn salary_validation(
        &self,
        user: &CurrentUser,
        body: dto::SalaryValidationRequest,
    ) -> Result<DeliveryReport, AppError> {
        let entity = self.target_entity(user, body.entity)?;
        let management = self.ensure_entity_active(&entity)?;
        let report = self
            .notify_management(
                &management,
                ContactCategory::SalaryElement,
                &Notification::SalaryValidation {
                    entity_name: entity.name.clone(),
                    message: body.message,
                },
            )
            .await;
        Ok(report)
    }

    /// Absence announced for an employee. Mailed and counted; the entity
    /// ledger is not touched (ledger absences go through the entity route).
    pub async fn declare_employee_absence(
        &self,
        user: &CurrentUser,
        id: EmployeeId,
        input: dto::DeclaredAbsenceInput,
        documents: Vec<Upload>,
    ) -> Result<AbsenceDetails, AppError> {
        let employee = self.employee_with_status(user, id, EmployeeStatus::Active)?;
        let entity = self.find_entity(employee.entity)?;
        let management = self.ensure_entity_active(&entity)?;

        let begin = parse_day(&input.start_date)?;
        let end = parse_day(&input.end_date)?;
        ensure_ordered(begin, end)?;
        let code = entity.require_absence(&input.code)?.clone();
        let matricule = employee.require_matricule()?.to_string();

        let urls = self
            .documents
            .store_all(&format!("{}/absences", entity.id), &documents, MAX_DOCUMENTS)
            .await?;

        let details = AbsenceDetails {
            employee_name: employee.full_name(),
            matricule,
            code: code.code,
            name: code.name,
            begin,
            end,
            documents: urls,
        };
        self.record_usage(UsageEvent::AbsenceDeclared, &entity);
        self.notify_management(
            &management,
            ContactCategory::AbsenceCollaborator,
            &Notification::AbsenceDeclared {
                entity_name: entity.name.clone(),
                details: details.clone(),
            },
        )
        .await;
        Ok(details)
    }

    pub(super) fn employee_for_ledger(&self, entity: &Entity, id: EmployeeId) -> Result<(Employee, Matricule), AppError> {
        let employee = self.find_employee(id)?;
        employee.ensure_in_entity(entity.id)?;
        let matricule = employee.require_matricule()?.clone();
        Ok((employee, matricule))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use easypaies_infra::notify::LogMailer;
    use easypaies_infra::storage::InMemoryDocumentStore;

    use super::*;
    use crate::config::AppConfig;

    fn services() -> AppServices {
        let mut config = AppConfig::local("test-secret");
        config.bcrypt_cost = 4;
        AppServices::build(
            config,
            Arc::new(LogMailer),
            Arc::new(InMemoryDocumentStore::new("docs", "https://docs.test")),
        )
        .unwrap()
    }

    fn hired(entity: EntityId, matricule: &str) -> Employee {
        let mut employee = Employee::hire(entity, "Jean", "Dupont", Utc::now()).unwrap();
        employee.matricule = Some(Matricule::parse(matricule).unwrap());
        employee
    }

    #[test]
    fn store_refuses_a_taken_matricule_in_the_same_entity() {
        let services = services();
        let entity = EntityId::new();
        let first = hired(entity, "M001");
        services.store_employee(&first, true).unwrap();

        let err = services.store_employee(&hired(entity, "M001"), true).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Same matricule in another entity, and rewriting the holder itself.
        services.store_employee(&hired(EntityId::new(), "M001"), true).unwrap();
        services.store_employee(&first, false).unwrap();
    }

    #[test]
    fn update_cannot_take_a_sibling_matricule() {
        let services = services();
        let entity = EntityId::new();
        services.store_employee(&hired(entity, "M001"), true).unwrap();
        let mut second = hired(entity, "M002");
        services.store_employee(&second, true).unwrap();

        second.matricule = Some(Matricule::parse("M001").unwrap());
        assert!(matches!(services.store_employee(&second, false), Err(AppError::Conflict(_))));
        let stored = services.employees.get(&second.id).unwrap();
        assert_eq!(stored.matricule.unwrap().as_str(), "M002");
    }

    #[test]
    fn concurrent_creates_with_one_matricule_keep_one() {
        let services = services();
        let entity = EntityId::new();
        let stored = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| services.store_employee(&hired(entity, "M001"), true).is_ok()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count()
        });
        assert_eq!(stored, 1);
        assert_eq!(services.employees.filter(&|e| e.entity == entity).len(), 1);
    }

    #[test]
    fn profile_patch_keeps_untouched_fields() {
        let profile = EmployeeProfile {
            city: Some("Lyon".into()),
            iban: Some("FR76".into()),
            ..EmployeeProfile::default()
        };
        let mut patch = Map::new();
        patch.insert("city".into(), Value::String("Paris".into()));
        patch.insert("notAProfileField".into(), Value::Bool(true));

        let patched = patch_profile(&profile, patch).unwrap();
        assert_eq!(patched.city.as_deref(), Some("Paris"));
        assert_eq!(patched.iban.as_deref(), Some("FR76"));
    }
}
