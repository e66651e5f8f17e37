//! Application services: infrastructure wiring plus the business operations
//! the routes call.
//!
//! One file per area; every operation takes the caller's [`CurrentUser`]
//! and checks scope before touching data.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use easypaies_auth::{NewAccount, PasswordHasher, Principal, Role, SessionIssuer, UserAccount};
use easypaies_core::{AbsenceRequestId, EmployeeId, EntityId, ManagementId, UserId};
use easypaies_events::{EventBus, EventEnvelope, InMemoryEventBus, UsageEvent, UsageFact};
use easypaies_infra::event_store::InMemoryEventStore;
use easypaies_infra::notify::{DeliveryReport, Mailer, Notification, NotificationDispatcher};
use easypaies_infra::projections::UsageCountersProjection;
use easypaies_infra::storage::{DocumentStore, DocumentUploader};
use easypaies_infra::workers::{ProjectionWorker, WorkerHandle};
use easypaies_infra::{CommandDispatcher, InMemoryRecordStore, RecordStore};
use easypaies_payroll::{ContactCategory, Employee, Entity, Management, Ressource, RessourceKind};

use crate::app::errors::AppError;
use crate::config::AppConfig;
use crate::context::CurrentUser;

pub mod auth;
pub mod contact;
pub mod employees;
pub mod entities;
pub mod ledger;
pub mod managements;
pub mod payslips;

pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<serde_json::Value>>;
pub type LedgerDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<EnvelopeBus>>;

pub struct AppServices {
    pub config: AppConfig,
    pub hasher: PasswordHasher,
    pub sessions: SessionIssuer,
    pub users: Arc<InMemoryRecordStore<UserId, UserAccount>>,
    pub managements: Arc<InMemoryRecordStore<ManagementId, Management>>,
    pub entities: Arc<InMemoryRecordStore<EntityId, Entity>>,
    pub employees: Arc<InMemoryRecordStore<EmployeeId, Employee>>,
    pub ressources: Arc<InMemoryRecordStore<(RessourceKind, String), Ressource>>,
    /// Which entity ledger holds each absence request.
    pub request_index: Arc<InMemoryRecordStore<AbsenceRequestId, EntityId>>,
    pub dispatcher: LedgerDispatcher,
    pub bus: Arc<EnvelopeBus>,
    pub notifier: NotificationDispatcher,
    pub documents: DocumentUploader,
    usage_worker: Mutex<Option<WorkerHandle>>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("env", &self.config.env)
            .field("notifier", &self.notifier)
            .field("documents", &self.documents)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// In-memory stores, the given transports, and the usage-counter
    /// projection running on its own thread.
    pub fn build(
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        document_store: Arc<dyn DocumentStore>,
    ) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Arc<EnvelopeBus> = Arc::new(InMemoryEventBus::new());
        let managements = Arc::new(InMemoryRecordStore::new());

        let projection = Arc::new(UsageCountersProjection::new(Arc::clone(&managements)));
        let usage_worker = ProjectionWorker::spawn("usage-counters", &bus, None, move |env: EventEnvelope<_>| {
            projection.apply_envelope(&env)
        })?;

        let services = Self {
            hasher: PasswordHasher::with_cost(config.bcrypt_cost),
            sessions: SessionIssuer::new(config.jwt_secret.as_bytes(), config.jwt_expires_in),
            users: Arc::new(InMemoryRecordStore::new()),
            managements,
            entities: Arc::new(InMemoryRecordStore::new()),
            employees: Arc::new(InMemoryRecordStore::new()),
            ressources: Arc::new(InMemoryRecordStore::new()),
            request_index: Arc::new(InMemoryRecordStore::new()),
            dispatcher: CommandDispatcher::new(store, Arc::clone(&bus)),
            bus,
            notifier: NotificationDispatcher::new(
                mailer,
                config.mail_from.clone(),
                config.mail_reply_to.clone(),
                config.mail_timeout,
            ),
            documents: DocumentUploader::new(document_store, config.storage_timeout),
            usage_worker: Mutex::new(Some(usage_worker)),
            config,
        };
        services.seed_admin()?;

        if let Some(url) = &services.config.database_url {
            tracing::info!(database_url = %url, "DATABASE_URL is set but records are kept in memory");
        }
        Ok(services)
    }

    fn seed_admin(&self) -> anyhow::Result<()> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password) else {
            return Ok(());
        };
        let new = NewAccount {
            first_name: "Admin".into(),
            last_name: "Easy-Paies".into(),
            email: email.clone(),
            role: Role::Admin,
            manager_of: None,
            customer_of: None,
        };
        let mut account = UserAccount::create(new, password, &self.hasher, Utc::now())?;
        account.first_connection = false;
        let email = account.email.clone();
        if self.users.insert_unique(account.id, account, &|u| u.email == email) {
            tracing::info!(email = %email, "admin account seeded");
        }
        Ok(())
    }

    /// Stop background workers. The process exits right after, so this is
    /// only needed for orderly shutdown.
    pub fn shutdown(&self) {
        let handle = self.usage_worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }

    // ─── Scope checks ───────────────────────────────────────────────────

    pub fn find_entity(&self, id: EntityId) -> Result<Entity, AppError> {
        self.entities
            .get(&id)
            .ok_or_else(|| AppError::not_found("No entity found with that ID"))
    }

    pub fn find_management(&self, id: ManagementId) -> Result<Management, AppError> {
        self.managements
            .get(&id)
            .ok_or_else(|| AppError::not_found("No management found with that ID"))
    }

    pub fn find_employee(&self, id: EmployeeId) -> Result<Employee, AppError> {
        self.employees
            .get(&id)
            .ok_or_else(|| AppError::not_found("No employee found with that ID"))
    }

    pub fn find_user(&self, id: UserId) -> Result<UserAccount, AppError> {
        self.users
            .get(&id)
            .filter(|u| u.active)
            .ok_or_else(|| AppError::not_found("No user found with that ID"))
    }

    /// The entity, if the caller may see it: admins see everything, managers
    /// their management's entities, client users their own company.
    pub fn entity_in_scope(&self, user: &CurrentUser, id: EntityId) -> Result<Entity, AppError> {
        let entity = self.find_entity(id)?;
        let allowed = match user.principal() {
            Principal::Admin => true,
            Principal::Manager { management } => management == Some(entity.management),
            Principal::Employer { entity: own } | Principal::Employee { entity: own, .. } => own == Some(entity.id),
            Principal::User => false,
        };
        if !allowed {
            return Err(AppError::forbidden());
        }
        Ok(entity)
    }

    pub fn management_in_scope(&self, user: &CurrentUser, id: ManagementId) -> Result<Management, AppError> {
        let management = self.find_management(id)?;
        let allowed = match user.principal() {
            Principal::Admin => true,
            Principal::Manager { management: own } => own == Some(management.id),
            _ => false,
        };
        if !allowed {
            return Err(AppError::forbidden());
        }
        Ok(management)
    }

    pub fn employee_in_scope(&self, user: &CurrentUser, id: EmployeeId) -> Result<Employee, AppError> {
        let employee = self.find_employee(id)?;
        self.entity_in_scope(user, employee.entity)?;
        if let Principal::Employee { employee: own, .. } = user.principal() {
            if own != Some(employee.id) {
                return Err(AppError::forbidden());
            }
        }
        Ok(employee)
    }

    /// Entities visible to the caller.
    pub fn visible_entities(&self, user: &CurrentUser) -> Vec<Entity> {
        match user.principal() {
            Principal::Admin => self.entities.list(),
            Principal::Manager { management: Some(m) } => self.entities.filter(&|e| e.management == m),
            Principal::Employer { entity: Some(id) } | Principal::Employee { entity: Some(id), .. } => {
                self.entities.get(&id).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// 403 with the suspension message when the entity or its management is
    /// suspended.
    pub fn ensure_entity_active(&self, entity: &Entity) -> Result<Management, AppError> {
        entity.ensure_active()?;
        let management = self.find_management(entity.management)?;
        management.ensure_active()?;
        Ok(management)
    }

    /// Login and `/users/me` refuse accounts whose company is suspended.
    pub fn ensure_account_not_suspended(&self, account: &UserAccount) -> Result<(), AppError> {
        let entity_suspended = account
            .customer_of
            .and_then(|id| self.entities.get(&id))
            .is_some_and(|e| e.suspended);
        let management_suspended = account
            .manager_of
            .and_then(|id| self.managements.get(&id))
            .is_some_and(|m| m.suspended);
        if entity_suspended || management_suspended {
            return Err(AppError::Suspended);
        }
        Ok(())
    }

    /// The entity an operation targets: the explicit one (admins, managers)
    /// or the caller's own company.
    pub fn target_entity(&self, user: &CurrentUser, explicit: Option<EntityId>) -> Result<Entity, AppError> {
        let id = explicit
            .or(user.entity())
            .ok_or_else(|| AppError::validation("Please specify the entity"))?;
        self.entity_in_scope(user, id)
    }

    /// Best-effort mail to one of the management's category mailboxes.
    pub async fn notify_management(
        &self,
        management: &Management,
        category: ContactCategory,
        notification: &Notification,
    ) -> DeliveryReport {
        let recipient = management.contacts.address_for(category).map(str::to_string);
        if recipient.is_none() {
            tracing::warn!(
                management_id = %management.id,
                kind = notification.kind(),
                "no mailbox configured for notification"
            );
        }
        self.notifier.send_to_many([recipient], notification).await
    }

    /// E-mail addresses of the employer accounts of an entity.
    pub fn employer_emails(&self, entity: EntityId) -> Vec<Option<String>> {
        self.users
            .filter(&|u| u.active && u.role == Role::Employer && u.customer_of == Some(entity))
            .into_iter()
            .map(|u| Some(u.email))
            .collect()
    }

    // ─── Usage facts ────────────────────────────────────────────────────

    /// Publish a usage fact for the counters projection. Counting is best
    /// effort and never fails the request.
    pub fn record_usage(&self, make: fn(UsageFact) -> UsageEvent, entity: &Entity) {
        let event = make(UsageFact {
            management_id: entity.management,
            entity_id: entity.id,
            occurred_at: Utc::now(),
        });
        let published = event
            .into_envelope()
            .map_err(|e| e.to_string())
            .and_then(|env| self.bus.publish(env).map_err(|e| format!("{e:?}")));
        if let Err(error) = published {
            tracing::warn!(entity_id = %entity.id, %error, "usage fact not published");
        }
    }
}
