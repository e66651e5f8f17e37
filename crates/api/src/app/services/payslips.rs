//! Payslip batch export: render the current batch, mail it to the payroll
//! office, then close the batch.
//!
//! The close happens only after the mail went out. A crash in between
//! re-sends the same batch on the next export.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use easypaies_core::EntityId;
use easypaies_infra::command_dispatcher::DispatchError;
use easypaies_infra::notify::{MailError, Notification};
use easypaies_payroll::{CloseBatch, ContactCategory, LedgerCommand, PayrollLedger};

use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;
use super::ledger::ledger_stream;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export for {0}")]
    EmptyBatch(String),

    #[error("no payslip mailbox configured for {0}")]
    NoRecipient(String),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::EmptyBatch(_) | ExportError::NoRecipient(_) => AppError::Validation(err.to_string()),
            ExportError::Mail(e) => e.into(),
            ExportError::Dispatch(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub entity: EntityId,
    pub through_sequence: u64,
    pub absence_count: usize,
    pub bonus_count: usize,
    pub uncatalogued_codes: Vec<String>,
    pub recipient: String,
}

impl AppServices {
    pub async fn export_and_clear(&self, user: &CurrentUser, entity_id: EntityId) -> Result<ExportSummary, AppError> {
        let entity = self.entity_in_scope(user, entity_id)?;
        let management = self.find_management(entity.management)?;

        let ledger = self.load_ledger(entity.id)?;
        let batch = ledger.prepare_batch(&entity.primes);
        if batch.is_empty() {
            return Err(ExportError::EmptyBatch(entity.name).into());
        }
        if !batch.uncatalogued_codes.is_empty() {
            tracing::warn!(
                entity_id = %entity.id,
                codes = ?batch.uncatalogued_codes,
                "bonus entries with codes missing from the catalog are left out of the file"
            );
        }
        let recipient = management
            .contacts
            .address_for(ContactCategory::GeneratePaySlip)
            .map(str::to_string)
            .ok_or_else(|| ExportError::NoRecipient(management.name.clone()))?;

        self.notifier
            .send(
                &recipient,
                &Notification::PayslipBatch {
                    entity_name: entity.name.clone(),
                    absences_csv: batch.absences_csv.clone(),
                    primes_csv: batch.primes_csv.clone(),
                },
            )
            .await
            .map_err(ExportError::from)?;

        self.dispatcher
            .dispatch(
                &ledger_stream(entity.id),
                LedgerCommand::CloseBatch(CloseBatch {
                    through_sequence: batch.through_sequence,
                    occurred_at: Utc::now(),
                }),
                || PayrollLedger::empty(entity.id),
            )
            .map_err(ExportError::from)?;

        tracing::info!(
            entity_id = %entity.id,
            through_sequence = batch.through_sequence,
            absences = batch.absence_count,
            bonuses = batch.bonus_count,
            recipients = 1,
            "payslip batch exported"
        );
        Ok(ExportSummary {
            entity: entity.id,
            through_sequence: batch.through_sequence,
            absence_count: batch.absence_count,
            bonus_count: batch.bonus_count,
            uncatalogued_codes: batch.uncatalogued_codes,
            recipient,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use easypaies_auth::{NewAccount, Role, UserAccount};
    use easypaies_core::{Matricule, PayCode};
    use easypaies_infra::RecordStore;
    use easypaies_infra::notify::RecordingMailer;
    use easypaies_infra::storage::InMemoryDocumentStore;
    use easypaies_payroll::{Entity, Management, ManagementContacts, RecordBonus};

    use super::*;
    use crate::config::AppConfig;

    struct Fixture {
        services: AppServices,
        mailer: Arc<RecordingMailer>,
        admin: CurrentUser,
        entity: EntityId,
    }

    fn fixture() -> Fixture {
        let mailer = Arc::new(RecordingMailer::new());
        let mut config = AppConfig::local("test-secret");
        config.bcrypt_cost = 4;
        let services = AppServices::build(
            config,
            mailer.clone(),
            Arc::new(InMemoryDocumentStore::new("docs", "https://docs.test")),
        )
        .unwrap();

        let management = Management::new(
            "Cabinet",
            ManagementContacts {
                email_generate_pay_slip: Some("paie@cabinet.fr".into()),
                ..ManagementContacts::default()
            },
            Utc::now(),
        )
        .unwrap();
        let mut entity = Entity::new("Boulangerie", management.id, Utc::now()).unwrap();
        entity.set_catalogs(vec![PayCode::new("P1", "Prime").unwrap()], vec![]);
        let entity_id = entity.id;
        services.managements.upsert(management.id, management);
        services.entities.upsert(entity.id, entity);

        let admin = UserAccount::create(
            NewAccount {
                first_name: "Root".into(),
                last_name: "Admin".into(),
                email: "root@easy-paies.fr".into(),
                role: Role::Admin,
                manager_of: None,
                customer_of: None,
            },
            "password1",
            &services.hasher,
            Utc::now(),
        )
        .unwrap();

        Fixture {
            services,
            mailer,
            admin: CurrentUser::new(admin),
            entity: entity_id,
        }
    }

    fn bonus(f: &Fixture, value: f64) {
        f.services
            .dispatcher
            .dispatch_append(
                &ledger_stream(f.entity),
                LedgerCommand::RecordBonus(RecordBonus {
                    matricule: Matricule::parse("A").unwrap(),
                    code: "P1".into(),
                    value,
                    occurred_at: Utc::now(),
                }),
                || PayrollLedger::empty(f.entity),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn export_mails_batch_then_clears_it() {
        let f = fixture();
        bonus(&f, 100.0);
        bonus(&f, 50.0);

        let summary = f.services.export_and_clear(&f.admin, f.entity).await.unwrap();
        assert_eq!(summary.bonus_count, 2);
        assert_eq!(summary.recipient, "paie@cabinet.fr");

        let sent = f.mailer.sent_to("paie@cabinet.fr");
        assert_eq!(sent.len(), 1);
        let primes = sent[0]
            .attachments
            .iter()
            .find(|a| a.filename == "primes.csv")
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&primes.content), "Matricule;P1\nA;150\n");

        let ledger = f.services.load_ledger(f.entity).unwrap();
        assert!(ledger.pending_bonuses().is_empty());
        f.services.shutdown();
    }

    #[tokio::test]
    async fn failed_mail_leaves_the_batch_open() {
        let f = fixture();
        bonus(&f, 10.0);
        f.mailer.set_failing(true);

        let err = f.services.export_and_clear(&f.admin, f.entity).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(f.services.load_ledger(f.entity).unwrap().pending_bonuses().len(), 1);
        f.services.shutdown();
    }

    #[tokio::test]
    async fn uncatalogued_bonus_codes_are_reported() {
        let f = fixture();
        bonus(&f, 20.0);
        f.services
            .dispatcher
            .dispatch_append(
                &ledger_stream(f.entity),
                LedgerCommand::RecordBonus(RecordBonus {
                    matricule: Matricule::parse("A").unwrap(),
                    code: "P9".into(),
                    value: 5.0,
                    occurred_at: Utc::now(),
                }),
                || PayrollLedger::empty(f.entity),
            )
            .unwrap();

        let summary = f.services.export_and_clear(&f.admin, f.entity).await.unwrap();
        assert_eq!(summary.bonus_count, 2);
        assert_eq!(summary.uncatalogued_codes, vec!["P9".to_string()]);
        f.services.shutdown();
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let f = fixture();
        let err = f.services.export_and_clear(&f.admin, f.entity).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(f.mailer.sent().is_empty());
        f.services.shutdown();
    }
}
