//! Contact forms and the global ressources catalog.

use easypaies_events::UsageEvent;
use easypaies_infra::RecordStore;
use easypaies_infra::notify::Notification;
use easypaies_infra::storage::{MAX_DOCUMENTS, Upload};
use easypaies_payroll::{ContactCategory, Ressource, RessourceKind};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

pub const CONTACT_PREFIX: &str = "contact";

impl AppServices {
    /// Public website form, mailed to the Easy-Paies inbox.
    pub async fn website_contact(&self, body: dto::WebsiteContactRequest) -> Result<(), AppError> {
        self.notifier
            .send(
                &self.config.contact_email,
                &Notification::WebsiteContact {
                    name: body.name,
                    email: body.email,
                    phone: body.phone,
                    message: body.message,
                },
            )
            .await?;
        Ok(())
    }

    /// Message from a client company to its payroll office, with documents.
    pub async fn entity_contact(
        &self,
        user: &CurrentUser,
        input: dto::EntityContactInput,
        documents: Vec<Upload>,
    ) -> Result<Vec<String>, AppError> {
        let entity = self.target_entity(user, input.entity)?;
        let management = self.ensure_entity_active(&entity)?;

        let urls = self
            .documents
            .store_all(CONTACT_PREFIX, &documents, MAX_DOCUMENTS)
            .await?;

        self.record_usage(UsageEvent::ContactMessageSent, &entity);
        self.notify_management(
            &management,
            ContactCategory::Contact,
            &Notification::EntityMessage {
                entity_name: entity.name.clone(),
                message: input.message,
                documents: urls.clone(),
            },
        )
        .await;
        tracing::info!(entity_id = %entity.id, documents = urls.len(), "entity contact sent");
        Ok(urls)
    }

    pub fn list_ressources(&self, kind: RessourceKind) -> Vec<Ressource> {
        self.ressources.filter(&|r| r.kind == kind)
    }

    pub fn create_ressource(&self, body: dto::CreateRessourceRequest) -> Result<Ressource, AppError> {
        let ressource = Ressource::new(body.kind, &body.code, &body.name)?;
        if !self
            .ressources
            .insert_unique(ressource.key(), ressource.clone(), &|_| false)
        {
            return Err(AppError::Conflict(format!("code {} already exists", ressource.code)));
        }
        Ok(ressource)
    }
}
