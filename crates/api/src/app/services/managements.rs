use chrono::Utc;

use easypaies_core::ManagementId;
use easypaies_infra::RecordStore;
use easypaies_infra::storage::{StorageError, Upload};
use easypaies_payroll::{Management, apply_suspension};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

impl AppServices {
    pub fn create_management(&self, body: dto::CreateManagementRequest) -> Result<Management, AppError> {
        let management = Management::new(body.name, body.contacts, Utc::now())?;
        self.managements.upsert(management.id, management.clone());
        tracing::info!(management_id = %management.id, "management created");
        Ok(management)
    }

    pub fn list_managements(&self, user: &CurrentUser) -> Vec<Management> {
        match user.management() {
            Some(own) => self.managements.get(&own).into_iter().collect(),
            None => self.managements.list(),
        }
    }

    pub fn update_management(
        &self,
        user: &CurrentUser,
        id: ManagementId,
        body: &dto::UpdateManagementRequest,
    ) -> Result<Management, AppError> {
        self.management_in_scope(user, id)?;
        let name = match &body.name {
            Some(raw) if raw.trim().is_empty() => return Err(AppError::validation("A management must have a name")),
            Some(raw) => Some(raw.trim().to_string()),
            None => None,
        };
        // In place, so counters bumped concurrently by the projection are kept.
        self.managements
            .update(&id, &mut |m| {
                if let Some(name) = &name {
                    m.name = name.clone();
                }
                body.apply_contacts(&mut m.contacts);
            })
            .ok_or_else(|| AppError::not_found("No management found with that ID"))
    }

    /// Remove the management, its entities, their employees and every
    /// account attached to any of them.
    pub fn delete_management(&self, id: ManagementId) -> Result<(), AppError> {
        self.find_management(id)?;
        let entities = self.entities.filter(&|e| e.management == id);
        for entity in &entities {
            self.remove_entity_records(entity.id);
        }
        let managers = self.users.filter(&|u| u.manager_of == Some(id));
        for user in &managers {
            self.users.remove(&user.id);
        }
        self.managements.remove(&id);
        tracing::info!(
            management_id = %id,
            entities = entities.len(),
            managers = managers.len(),
            "management deleted"
        );
        Ok(())
    }

    /// Suspend or reactivate a management together with all its entities.
    pub fn set_management_suspension(&self, id: ManagementId, suspended: bool) -> Result<Management, AppError> {
        let mut management = self.find_management(id)?;
        let mut entities = self.entities.filter(&|e| e.management == id);
        let touched = apply_suspension(&mut management, &mut entities, suspended);

        for entity_id in &touched {
            self.entities.update(entity_id, &mut |e| e.suspended = suspended);
        }
        let management = self
            .managements
            .update(&id, &mut |m| m.suspended = suspended)
            .ok_or_else(|| AppError::not_found("No management found with that ID"))?;

        tracing::info!(management_id = %id, suspended, entities = touched.len(), "suspension updated");
        Ok(management)
    }

    pub async fn update_logo(&self, user: &CurrentUser, id: ManagementId, logo: Upload) -> Result<Management, AppError> {
        self.management_in_scope(user, id)?;
        if !logo.content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(StorageError::UnsupportedType(logo.content_type).into());
        }
        let urls = self.documents.store_all(&id.to_string(), &[logo], 1).await?;
        let url = urls.into_iter().next();
        self.managements
            .update(&id, &mut |m| m.logo = url.clone())
            .ok_or_else(|| AppError::not_found("No management found with that ID"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use easypaies_auth::Role;
    use easypaies_core::EntityId;
    use easypaies_infra::notify::LogMailer;
    use easypaies_infra::storage::InMemoryDocumentStore;
    use easypaies_payroll::{Entity, ManagementContacts};

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

    fn seed(services: &AppServices) -> (ManagementId, EntityId, EntityId) {
        let management = Management::new("Cabinet", ManagementContacts::default(), Utc::now()).unwrap();
        let other = Management::new("Autre", ManagementContacts::default(), Utc::now()).unwrap();
        let mine = Entity::new("Boulangerie", management.id, Utc::now()).unwrap();
        let foreign = Entity::new("Garage", other.id, Utc::now()).unwrap();
        let ids = (management.id, mine.id, foreign.id);
        services.managements.upsert(management.id, management);
        services.managements.upsert(other.id, other);
        services.entities.upsert(mine.id, mine);
        services.entities.upsert(foreign.id, foreign);
        ids
    }

    #[test]
    fn suspension_cascades_and_reverses_exactly() {
        let services = services();
        let (management, mine, foreign) = seed(&services);

        services.set_management_suspension(management, true).unwrap();
        assert!(services.find_management(management).unwrap().suspended);
        assert!(services.find_entity(mine).unwrap().suspended);
        assert!(!services.find_entity(foreign).unwrap().suspended);

        services.set_management_suspension(management, false).unwrap();
        assert!(!services.find_management(management).unwrap().suspended);
        assert!(!services.find_entity(mine).unwrap().suspended);
        assert!(!services.find_entity(foreign).unwrap().suspended);
        services.shutdown();
    }

    #[test]
    fn delete_cascades_to_entities_and_accounts() {
        let services = services();
        let (management, mine, foreign) = seed(&services);

        let hasher = &services.hasher;
        for (role, manager_of, customer_of, email) in [
            (Role::Manager, Some(management), None, "m@cabinet.fr"),
            (Role::Employer, None, Some(mine), "e@boulangerie.fr"),
            (Role::Employer, None, Some(foreign), "e@garage.fr"),
        ] {
            let account = easypaies_auth::UserAccount::create(
                easypaies_auth::NewAccount {
                    first_name: "A".into(),
                    last_name: "B".into(),
                    email: email.into(),
                    role,
                    manager_of,
                    customer_of,
                },
                "password1",
                hasher,
                Utc::now(),
            )
            .unwrap();
            services.users.upsert(account.id, account);
        }

        services.delete_management(management).unwrap();
        assert!(services.find_management(management).is_err());
        assert!(services.find_entity(mine).is_err());
        assert!(services.find_entity(foreign).is_ok());
        let remaining: Vec<_> = services.users.list().into_iter().map(|u| u.email).collect();
        assert_eq!(remaining, ["e@garage.fr"]);
        services.shutdown();
    }
}
