use chrono::Utc;

use easypaies_auth::Principal;
use easypaies_core::{EntityId, PayCode};
use easypaies_infra::RecordStore;
use easypaies_infra::storage::{StorageError, Upload};
use easypaies_payroll::Entity;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

fn checked_codes(codes: Vec<PayCode>) -> Result<Vec<PayCode>, AppError> {
    codes
        .into_iter()
        .map(|c| PayCode::new(&c.code, c.name).map_err(AppError::from))
        .collect()
}

impl AppServices {
    pub fn create_entity(&self, user: &CurrentUser, body: dto::CreateEntityRequest) -> Result<Entity, AppError> {
        let management = self.management_in_scope(user, body.management)?;
        management.ensure_active()?;

        let mut entity = Entity::new(body.name, management.id, Utc::now())?;
        entity.set_catalogs(checked_codes(body.primes)?, checked_codes(body.absences)?);
        self.entities.upsert(entity.id, entity.clone());
        tracing::info!(entity_id = %entity.id, management_id = %management.id, "entity created");
        Ok(entity)
    }

    pub fn update_entity(&self, user: &CurrentUser, id: EntityId, body: dto::UpdateEntityRequest) -> Result<Entity, AppError> {
        let current = self.entity_in_scope(user, id)?;
        if matches!(user.principal(), Principal::Employer { .. } | Principal::Employee { .. }) {
            return Err(AppError::forbidden());
        }

        let name = match body.name {
            Some(raw) if raw.trim().is_empty() => return Err(AppError::validation("An entity must have a name")),
            other => other.map(|n| n.trim().to_string()),
        };
        let primes = match body.primes {
            Some(codes) => checked_codes(codes)?,
            None => current.primes,
        };
        let absences = match body.absences {
            Some(codes) => checked_codes(codes)?,
            None => current.absences,
        };

        self.entities
            .update(&id, &mut |e| {
                if let Some(name) = &name {
                    e.name = name.clone();
                }
                e.set_catalogs(primes.clone(), absences.clone());
            })
            .ok_or_else(|| AppError::not_found("No entity found with that ID"))
    }

    /// Drop the entity, its employees and every account attached to it.
    pub(super) fn remove_entity_records(&self, id: EntityId) {
        for user in self.users.filter(&|u| u.customer_of == Some(id)) {
            self.users.remove(&user.id);
        }
        for employee in self.employees.filter(&|e| e.entity == id) {
            self.employees.remove(&employee.id);
        }
        self.entities.remove(&id);
    }

    pub fn delete_entity(&self, user: &CurrentUser, id: EntityId) -> Result<(), AppError> {
        self.entity_in_scope(user, id)?;
        self.remove_entity_records(id);
        tracing::info!(entity_id = %id, "entity deleted");
        Ok(())
    }

    /// Company information sheet, PDF only.
    pub async fn update_informations(&self, user: &CurrentUser, id: EntityId, document: Upload) -> Result<Entity, AppError> {
        let entity = self.entity_in_scope(user, id)?;
        self.ensure_entity_active(&entity)?;
        if !document.content_type.eq_ignore_ascii_case("application/pdf") {
            return Err(StorageError::UnsupportedType(document.content_type).into());
        }
        let url = self
            .documents
            .store_all(&id.to_string(), &[document], 1)
            .await?
            .into_iter()
            .next();
        self.entities
            .update(&id, &mut |e| e.informations = url.clone())
            .ok_or_else(|| AppError::not_found("No entity found with that ID"))
    }

    pub fn bonus_catalog(&self, user: &CurrentUser, id: EntityId) -> Result<Vec<PayCode>, AppError> {
        Ok(self.entity_in_scope(user, id)?.primes)
    }

    pub fn absence_catalog(&self, user: &CurrentUser, id: EntityId) -> Result<Vec<PayCode>, AppError> {
        Ok(self.entity_in_scope(user, id)?.absences)
    }
}
