//! Ledger operations: declared absences, salary elements, advances and the
//! absence-request workflow.
//!
//! Appends go through `dispatch_append`; decisions and deletions are state
//! transitions and go through `dispatch`.

use chrono::Utc;
use serde::Serialize;

use easypaies_auth::Principal;
use easypaies_core::{AbsenceRequestId, EntityId};
use easypaies_events::UsageEvent;
use easypaies_infra::RecordStore;
use easypaies_infra::StreamRef;
use easypaies_infra::notify::{AbsenceDetails, Notification, SalaryLine};
use easypaies_infra::storage::{MAX_DOCUMENTS, Upload};
use easypaies_payroll::dates::{ensure_ordered, parse_day};
use easypaies_payroll::{
    AbsenceDecision, AbsenceEntry, AbsenceRequest, AdvanceEntry, BonusEntry, ContactCategory, DecideAbsenceRequest,
    DeleteAbsenceRequest, Employee, Entity, LEDGER_AGGREGATE_TYPE, LedgerCommand, PayrollLedger, RecordAbsence,
    RecordBonus, RequestAdvance, SubmitAbsenceRequest,
};

use crate::app::dto;
use crate::app::errors::AppError;
use crate::context::CurrentUser;

use super::AppServices;

pub const ABSENCE_REQUEST_PREFIX: &str = "demandeAbsence";

pub fn ledger_stream(entity_id: EntityId) -> StreamRef {
    StreamRef {
        entity_id,
        aggregate_id: entity_id.ledger_stream(),
        aggregate_type: LEDGER_AGGREGATE_TYPE,
    }
}

/// Read view of one entity ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub entity: EntityId,
    pub version: u64,
    pub batches_closed: u32,
    pub pending_bonuses: Vec<BonusEntry>,
    pub pending_absences: Vec<AbsenceEntry>,
    pub advances: Vec<AdvanceEntry>,
    pub absence_requests: Vec<AbsenceRequest>,
}

fn request_details(employee_name: String, request: &AbsenceRequest) -> AbsenceDetails {
    AbsenceDetails {
        employee_name,
        matricule: request.matricule.to_string(),
        code: request.absence_code.clone(),
        name: request.absence_name.clone(),
        begin: request.begin_date,
        end: request.end_date,
        documents: request.documents.clone(),
    }
}

impl AppServices {
    pub fn load_ledger(&self, entity_id: EntityId) -> Result<PayrollLedger, AppError> {
        Ok(self
            .dispatcher
            .load(&ledger_stream(entity_id), || PayrollLedger::empty(entity_id))?)
    }

    fn append(&self, entity_id: EntityId, command: LedgerCommand) -> Result<(), AppError> {
        self.dispatcher
            .dispatch_append(&ledger_stream(entity_id), command, || PayrollLedger::empty(entity_id))?;
        Ok(())
    }

    fn transition(&self, entity_id: EntityId, command: LedgerCommand) -> Result<(), AppError> {
        self.dispatcher
            .dispatch(&ledger_stream(entity_id), command, || PayrollLedger::empty(entity_id))?;
        Ok(())
    }

    /// Where mail about an employee goes: the linked account, else the
    /// address on the HR record.
    pub fn employee_email(&self, employee: &Employee) -> Option<String> {
        employee
            .user
            .and_then(|id| self.users.get(&id))
            .filter(|u| u.active)
            .map(|u| u.email)
            .or_else(|| employee.profile.mail.clone())
    }

    pub fn ledger_view(&self, user: &CurrentUser, entity_id: EntityId) -> Result<LedgerView, AppError> {
        self.entity_in_scope(user, entity_id)?;
        let ledger = self.load_ledger(entity_id)?;
        Ok(LedgerView {
            entity: entity_id,
            version: easypaies_core::AggregateRoot::version(&ledger),
            batches_closed: ledger.batches_closed(),
            pending_bonuses: ledger.pending_bonuses().to_vec(),
            pending_absences: ledger.pending_absences().to_vec(),
            advances: ledger.advances().to_vec(),
            absence_requests: ledger.absence_requests().to_vec(),
        })
    }

    /// Absence entered by the client for the next payslip batch.
    pub async fn record_entity_absence(
        &self,
        user: &CurrentUser,
        entity_id: EntityId,
        input: dto::AbsenceInput,
        documents: Vec<Upload>,
    ) -> Result<AbsenceDetails, AppError> {
        let entity = self.entity_in_scope(user, entity_id)?;
        let management = self.ensure_entity_active(&entity)?;

        let employee_id = input
            .employee_id
            .ok_or_else(|| AppError::validation("Please specify the employee"))?;
        let (employee, matricule) = self.employee_for_ledger(&entity, employee_id)?;
        let code = entity.require_absence(&input.code)?.clone();
        let start_date = parse_day(&input.start_date)?;
        let end_date = parse_day(&input.end_date)?;
        ensure_ordered(start_date, end_date)?;

        let urls = self
            .documents
            .store_all(&format!("{}/absences", entity.id), &documents, MAX_DOCUMENTS)
            .await?;

        self.append(
            entity.id,
            LedgerCommand::RecordAbsence(RecordAbsence {
                matricule: matricule.clone(),
                code: code.code.clone(),
                start_date,
                end_date,
                documents: urls.clone(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(entity_id = %entity.id, employee_id = %employee.id, code = %code.code, "absence recorded");

        let details = AbsenceDetails {
            employee_name: employee.full_name(),
            matricule: matricule.to_string(),
            code: code.code,
            name: code.name,
            begin: start_date,
            end: end_date,
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

    /// Bonus lines for the next batch. Every line is checked before any is
    /// appended.
    pub async fn add_salary_elements(
        &self,
        user: &CurrentUser,
        entity_id: EntityId,
        body: dto::SalaryElementsRequest,
    ) -> Result<Vec<SalaryLine>, AppError> {
        let entity = self.entity_in_scope(user, entity_id)?;
        let management = self.ensure_entity_active(&entity)?;

        let mut commands = Vec::with_capacity(body.elements.len());
        let mut lines = Vec::with_capacity(body.elements.len());
        let now = Utc::now();
        for element in &body.elements {
            let (employee, matricule) = self.employee_for_ledger(&entity, element.employee_id)?;
            let code = entity.require_prime(&element.code)?;
            if !element.value.is_finite() {
                return Err(AppError::validation("A salary element value must be a number"));
            }
            lines.push(SalaryLine {
                employee_name: employee.full_name(),
                matricule: matricule.to_string(),
                code: code.code.clone(),
                value: element.value,
            });
            commands.push(LedgerCommand::RecordBonus(RecordBonus {
                matricule,
                code: code.code.clone(),
                value: element.value,
                occurred_at: now,
            }));
        }

        for command in commands {
            self.append(entity.id, command)?;
        }
        tracing::info!(entity_id = %entity.id, lines = lines.len(), "salary elements recorded");

        self.record_usage(UsageEvent::SalaryElementsEntered, &entity);
        self.notify_management(
            &management,
            ContactCategory::SalaryElement,
            &Notification::SalaryElements {
                entity_name: entity.name.clone(),
                lines: lines.clone(),
            },
        )
        .await;
        Ok(lines)
    }

    pub async fn request_advance(
        &self,
        user: &CurrentUser,
        entity_id: EntityId,
        body: dto::AdvanceRequestBody,
    ) -> Result<(), AppError> {
        let entity = self.entity_in_scope(user, entity_id)?;
        let management = self.ensure_entity_active(&entity)?;

        let employee_id = match user.principal() {
            Principal::Employee { employee, .. } => employee,
            _ => body.employee_id,
        }
        .ok_or_else(|| AppError::validation("Please specify the employee"))?;
        let employee = self.find_employee(employee_id)?;
        employee.ensure_in_entity(entity.id)?;

        self.append(
            entity.id,
            LedgerCommand::RequestAdvance(RequestAdvance {
                employee_id,
                amount: body.amount,
                reason: body.reason.clone(),
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(entity_id = %entity.id, employee_id = %employee_id, "advance requested");

        self.notify_management(
            &management,
            ContactCategory::SalaryElement,
            &Notification::AdvanceRequested {
                entity_name: entity.name.clone(),
                employee_name: employee.full_name(),
                amount: body.amount,
                reason: body.reason,
            },
        )
        .await;
        Ok(())
    }

    // ─── Absence requests ───────────────────────────────────────────────

    pub async fn submit_absence_request(
        &self,
        user: &CurrentUser,
        input: dto::AbsenceRequestInput,
        documents: Vec<Upload>,
    ) -> Result<AbsenceRequest, AppError> {
        let employee_id = match user.principal() {
            Principal::Employee { employee, .. } => employee,
            _ => input.employee_id,
        }
        .ok_or_else(|| AppError::validation("Please specify the employee"))?;
        let employee = self.employee_in_scope(user, employee_id)?;
        let entity = self.find_entity(employee.entity)?;
        self.ensure_entity_active(&entity)?;

        let matricule = employee.require_matricule()?.clone();
        let code = entity.require_absence(&input.absence_code)?.clone();
        let begin_date = parse_day(&input.begin_date)?;
        let end_date = parse_day(&input.end_date)?;
        ensure_ordered(begin_date, end_date)?;

        let urls = self
            .documents
            .store_all(ABSENCE_REQUEST_PREFIX, &documents, MAX_DOCUMENTS)
            .await?;

        let request_id = AbsenceRequestId::new();
        self.append(
            entity.id,
            LedgerCommand::SubmitAbsenceRequest(SubmitAbsenceRequest {
                request_id,
                employee_id,
                matricule,
                code: code.code,
                name: code.name,
                begin_date,
                end_date,
                documents: urls,
                occurred_at: Utc::now(),
            }),
        )?;
        self.request_index.upsert(request_id, entity.id);

        let request = self
            .load_ledger(entity.id)?
            .absence_request(request_id)
            .cloned()
            .ok_or_else(|| AppError::Internal("absence request missing after submission".into()))?;
        tracing::info!(entity_id = %entity.id, employee_id = %employee_id, request_id = %request_id, "absence request submitted");

        let details = request_details(employee.full_name(), &request);
        let report = self
            .notifier
            .send_to_many(
                self.employer_emails(entity.id),
                &Notification::AbsenceRequestSubmitted {
                    entity_name: entity.name.clone(),
                    details,
                },
            )
            .await;
        tracing::debug!(recipients = report.delivered.len(), "employers notified");
        self.notifier
            .send_to_many(
                [self.employee_email(&employee)],
                &Notification::AbsenceRequestReceived {
                    entity_name: entity.name.clone(),
                    first_name: employee.first_name.clone(),
                },
            )
            .await;
        Ok(request)
    }

    pub fn list_absence_requests(&self, user: &CurrentUser) -> Result<Vec<AbsenceRequest>, AppError> {
        let own = match user.principal() {
            Principal::Employee { employee, .. } => Some(employee),
            _ => None,
        };
        let mut requests = Vec::new();
        for entity in self.visible_entities(user) {
            let ledger = self.load_ledger(entity.id)?;
            requests.extend(
                ledger
                    .absence_requests()
                    .iter()
                    .filter(|r| own.is_none_or(|own| own == Some(r.employee_id)))
                    .cloned(),
            );
        }
        Ok(requests)
    }

    /// The request and the entity whose ledger holds it.
    pub fn find_absence_request(&self, user: &CurrentUser, id: AbsenceRequestId) -> Result<(AbsenceRequest, Entity), AppError> {
        let not_found = || AppError::not_found("No absence request found with that ID");
        let entity_id = self.request_index.get(&id).ok_or_else(not_found)?;
        let entity = self.entity_in_scope(user, entity_id)?;
        let request = self
            .load_ledger(entity_id)?
            .absence_request(id)
            .cloned()
            .ok_or_else(not_found)?;
        if let Principal::Employee { employee, .. } = user.principal() {
            if employee != Some(request.employee_id) {
                return Err(AppError::forbidden());
            }
        }
        Ok((request, entity))
    }

    /// Approve or reject a pending request. Approval appends the absence to
    /// the current batch in the same event; a second decision is a 409.
    pub async fn decide_absence_request(
        &self,
        user: &CurrentUser,
        id: AbsenceRequestId,
        decision: AbsenceDecision,
    ) -> Result<AbsenceRequest, AppError> {
        let (_, entity) = self.find_absence_request(user, id)?;
        let management = self.ensure_entity_active(&entity)?;

        self.transition(
            entity.id,
            LedgerCommand::DecideAbsenceRequest(DecideAbsenceRequest {
                request_id: id,
                decision,
                occurred_at: Utc::now(),
            }),
        )?;
        let (request, _) = self.find_absence_request(user, id)?;
        tracing::info!(entity_id = %entity.id, request_id = %id, status = request.status.as_str(), "absence request decided");

        let employee = self.employees.get(&request.employee_id);
        let employee_name = employee
            .as_ref()
            .map(Employee::full_name)
            .unwrap_or_else(|| request.matricule.to_string());
        let employee_email = employee.as_ref().and_then(|e| self.employee_email(e));
        let details = request_details(employee_name, &request);

        match decision {
            AbsenceDecision::Approve => {
                self.record_usage(UsageEvent::AbsenceDeclared, &entity);
                let validated = Notification::AbsenceValidated {
                    entity_name: entity.name.clone(),
                    details: details.clone(),
                };
                self.notify_management(&management, ContactCategory::GeneratePaySlip, &validated)
                    .await;
                self.notifier
                    .send_to_many(self.employer_emails(entity.id), &validated)
                    .await;
                self.notifier
                    .send_to_many(
                        [employee_email],
                        &Notification::AbsenceRequestApproved {
                            entity_name: entity.name.clone(),
                            details,
                        },
                    )
                    .await;
            }
            AbsenceDecision::Reject => {
                self.notifier
                    .send_to_many(
                        [employee_email],
                        &Notification::AbsenceRequestRejected {
                            entity_name: entity.name.clone(),
                            details,
                        },
                    )
                    .await;
            }
        }
        Ok(request)
    }

    pub fn delete_absence_request(&self, user: &CurrentUser, id: AbsenceRequestId) -> Result<(), AppError> {
        let (_, entity) = self.find_absence_request(user, id)?;
        self.transition(
            entity.id,
            LedgerCommand::DeleteAbsenceRequest(DeleteAbsenceRequest {
                request_id: id,
                occurred_at: Utc::now(),
            }),
        )?;
        self.request_index.remove(&id);
        Ok(())
    }
}
