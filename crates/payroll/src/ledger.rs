use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use easypaies_core::{
    AbsenceRequestId, Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId, EntityId, Matricule,
};
use easypaies_events::Event;

use crate::absence_request::{AbsenceDecision, AbsenceRequest, AbsenceRequestStatus};
use crate::dates::ensure_ordered;

/// Aggregate type recorded on every ledger envelope.
pub const LEDGER_AGGREGATE_TYPE: &str = "payroll.ledger";

// ─── Entries ───────────────────────────────────────────────────────────────

/// One bonus line. `sequence` is the stream position of the event that
/// recorded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusEntry {
    pub sequence: u64,
    pub matricule: Matricule,
    pub code: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "requestId", rename_all = "camelCase")]
pub enum AbsenceSource {
    Declared,
    Request(AbsenceRequestId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceEntry {
    pub sequence: u64,
    pub matricule: Matricule,
    pub code: String,
    /// Always 1: one row per declared period.
    pub value: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<String>,
    pub source: AbsenceSource,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceEntry {
    pub sequence: u64,
    pub employee_id: EmployeeId,
    pub amount: f64,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

// ─── Commands ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBonus {
    pub matricule: Matricule,
    pub code: String,
    pub value: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAbsence {
    pub matricule: Matricule,
    pub code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAdvance {
    pub employee_id: EmployeeId,
    pub amount: f64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAbsenceRequest {
    pub request_id: AbsenceRequestId,
    pub employee_id: EmployeeId,
    pub matricule: Matricule,
    pub code: String,
    pub name: String,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecideAbsenceRequest {
    pub request_id: AbsenceRequestId,
    pub decision: AbsenceDecision,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAbsenceRequest {
    pub request_id: AbsenceRequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Marks every entry up to and including `through_sequence` as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseBatch {
    pub through_sequence: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordBonus(RecordBonus),
    RecordAbsence(RecordAbsence),
    RequestAdvance(RequestAdvance),
    SubmitAbsenceRequest(SubmitAbsenceRequest),
    DecideAbsenceRequest(DecideAbsenceRequest),
    DeleteAbsenceRequest(DeleteAbsenceRequest),
    CloseBatch(CloseBatch),
}

// ─── Events ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    BonusRecorded {
        matricule: Matricule,
        code: String,
        value: f64,
        occurred_at: DateTime<Utc>,
    },
    AbsenceRecorded {
        matricule: Matricule,
        code: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        documents: Vec<String>,
        occurred_at: DateTime<Utc>,
    },
    AdvanceRequested {
        employee_id: EmployeeId,
        amount: f64,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    AbsenceRequestSubmitted {
        request: AbsenceRequest,
    },
    /// Status change and ledger row in one event, so approval is atomic.
    AbsenceRequestApproved {
        request_id: AbsenceRequestId,
        matricule: Matricule,
        code: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        documents: Vec<String>,
        occurred_at: DateTime<Utc>,
    },
    AbsenceRequestRejected {
        request_id: AbsenceRequestId,
        occurred_at: DateTime<Utc>,
    },
    AbsenceRequestDeleted {
        request_id: AbsenceRequestId,
        occurred_at: DateTime<Utc>,
    },
    BatchClosed {
        through_sequence: u64,
        bonus_count: usize,
        absence_count: usize,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BonusRecorded { .. } => "payroll.ledger.bonus_recorded",
            LedgerEvent::AbsenceRecorded { .. } => "payroll.ledger.absence_recorded",
            LedgerEvent::AdvanceRequested { .. } => "payroll.ledger.advance_requested",
            LedgerEvent::AbsenceRequestSubmitted { .. } => "payroll.ledger.absence_request_submitted",
            LedgerEvent::AbsenceRequestApproved { .. } => "payroll.ledger.absence_request_approved",
            LedgerEvent::AbsenceRequestRejected { .. } => "payroll.ledger.absence_request_rejected",
            LedgerEvent::AbsenceRequestDeleted { .. } => "payroll.ledger.absence_request_deleted",
            LedgerEvent::BatchClosed { .. } => "payroll.ledger.batch_closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::BonusRecorded { occurred_at, .. }
            | LedgerEvent::AbsenceRecorded { occurred_at, .. }
            | LedgerEvent::AdvanceRequested { occurred_at, .. }
            | LedgerEvent::AbsenceRequestApproved { occurred_at, .. }
            | LedgerEvent::AbsenceRequestRejected { occurred_at, .. }
            | LedgerEvent::AbsenceRequestDeleted { occurred_at, .. }
            | LedgerEvent::BatchClosed { occurred_at, .. } => *occurred_at,
            LedgerEvent::AbsenceRequestSubmitted { request } => request.requested_at,
        }
    }
}

// ─── Aggregate ─────────────────────────────────────────────────────────────

/// Aggregate root: the payroll ledger of one entity.
///
/// The stream is append-only. Exported entries are not deleted; the
/// `BatchClosed` marker moves the batch boundary and rehydration drops
/// everything at or below it from the in-memory view.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollLedger {
    id: AggregateId,
    entity_id: EntityId,
    version: u64,
    closed_through: u64,
    batches_closed: u32,
    bonuses: Vec<BonusEntry>,
    absences: Vec<AbsenceEntry>,
    advances: Vec<AdvanceEntry>,
    requests: Vec<AbsenceRequest>,
}

impl PayrollLedger {
    /// Empty aggregate for rehydration.
    pub fn empty(entity_id: EntityId) -> Self {
        Self {
            id: entity_id.ledger_stream(),
            entity_id,
            version: 0,
            closed_through: 0,
            batches_closed: 0,
            bonuses: Vec::new(),
            absences: Vec::new(),
            advances: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Bonuses not yet exported, in append order.
    pub fn pending_bonuses(&self) -> &[BonusEntry] {
        &self.bonuses
    }

    /// Absences not yet exported, in append order.
    pub fn pending_absences(&self) -> &[AbsenceEntry] {
        &self.absences
    }

    pub fn advances(&self) -> &[AdvanceEntry] {
        &self.advances
    }

    pub fn absence_requests(&self) -> &[AbsenceRequest] {
        &self.requests
    }

    pub fn absence_request(&self, id: AbsenceRequestId) -> Option<&AbsenceRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Highest sequence already covered by an export.
    pub fn closed_through(&self) -> u64 {
        self.closed_through
    }

    pub fn batches_closed(&self) -> u32 {
        self.batches_closed
    }

    fn request_mut(&mut self, id: AbsenceRequestId) -> Option<&mut AbsenceRequest> {
        self.requests.iter_mut().find(|r| r.id == id)
    }
}

impl AggregateRoot for PayrollLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for PayrollLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.version += 1;
        let sequence = self.version;

        match event {
            LedgerEvent::BonusRecorded {
                matricule,
                code,
                value,
                occurred_at,
            } => self.bonuses.push(BonusEntry {
                sequence,
                matricule: matricule.clone(),
                code: code.clone(),
                value: *value,
                recorded_at: *occurred_at,
            }),
            LedgerEvent::AbsenceRecorded {
                matricule,
                code,
                start_date,
                end_date,
                documents,
                occurred_at,
            } => self.absences.push(AbsenceEntry {
                sequence,
                matricule: matricule.clone(),
                code: code.clone(),
                value: 1,
                start_date: *start_date,
                end_date: *end_date,
                documents: documents.clone(),
                source: AbsenceSource::Declared,
                recorded_at: *occurred_at,
            }),
            LedgerEvent::AdvanceRequested {
                employee_id,
                amount,
                reason,
                occurred_at,
            } => self.advances.push(AdvanceEntry {
                sequence,
                employee_id: *employee_id,
                amount: *amount,
                reason: reason.clone(),
                requested_at: *occurred_at,
            }),
            LedgerEvent::AbsenceRequestSubmitted { request } => self.requests.push(request.clone()),
            LedgerEvent::AbsenceRequestApproved {
                request_id,
                matricule,
                code,
                start_date,
                end_date,
                documents,
                occurred_at,
            } => {
                if let Some(r) = self.request_mut(*request_id) {
                    r.status = AbsenceRequestStatus::Approved;
                    r.decided_at = Some(*occurred_at);
                }
                self.absences.push(AbsenceEntry {
                    sequence,
                    matricule: matricule.clone(),
                    code: code.clone(),
                    value: 1,
                    start_date: *start_date,
                    end_date: *end_date,
                    documents: documents.clone(),
                    source: AbsenceSource::Request(*request_id),
                    recorded_at: *occurred_at,
                });
            }
            LedgerEvent::AbsenceRequestRejected { request_id, occurred_at } => {
                if let Some(r) = self.request_mut(*request_id) {
                    r.status = AbsenceRequestStatus::Rejected;
                    r.decided_at = Some(*occurred_at);
                }
            }
            LedgerEvent::AbsenceRequestDeleted { request_id, .. } => {
                self.requests.retain(|r| r.id != *request_id);
            }
            LedgerEvent::BatchClosed { through_sequence, .. } => {
                let through = *through_sequence;
                self.closed_through = self.closed_through.max(through);
                self.batches_closed += 1;
                self.bonuses.retain(|b| b.sequence > through);
                self.absences.retain(|a| a.sequence > through);
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordBonus(cmd) => self.handle_record_bonus(cmd),
            LedgerCommand::RecordAbsence(cmd) => self.handle_record_absence(cmd),
            LedgerCommand::RequestAdvance(cmd) => self.handle_request_advance(cmd),
            LedgerCommand::SubmitAbsenceRequest(cmd) => self.handle_submit(cmd),
            LedgerCommand::DecideAbsenceRequest(cmd) => self.handle_decide(cmd),
            LedgerCommand::DeleteAbsenceRequest(cmd) => self.handle_delete(cmd),
            LedgerCommand::CloseBatch(cmd) => self.handle_close(cmd),
        }
    }
}

impl PayrollLedger {
    fn handle_record_bonus(&self, cmd: &RecordBonus) -> Result<Vec<LedgerEvent>, DomainError> {
        if !cmd.value.is_finite() {
            return Err(DomainError::validation("bonus value must be a finite number"));
        }
        let code = required_code(&cmd.code)?;
        Ok(vec![LedgerEvent::BonusRecorded {
            matricule: cmd.matricule.clone(),
            code,
            value: cmd.value,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_record_absence(&self, cmd: &RecordAbsence) -> Result<Vec<LedgerEvent>, DomainError> {
        ensure_ordered(cmd.start_date, cmd.end_date)?;
        let code = required_code(&cmd.code)?;
        Ok(vec![LedgerEvent::AbsenceRecorded {
            matricule: cmd.matricule.clone(),
            code,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            documents: cmd.documents.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_request_advance(&self, cmd: &RequestAdvance) -> Result<Vec<LedgerEvent>, DomainError> {
        if !cmd.amount.is_finite() || cmd.amount <= 0.0 {
            return Err(DomainError::validation("advance amount must be positive"));
        }
        Ok(vec![LedgerEvent::AdvanceRequested {
            employee_id: cmd.employee_id,
            amount: cmd.amount,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit(&self, cmd: &SubmitAbsenceRequest) -> Result<Vec<LedgerEvent>, DomainError> {
        ensure_ordered(cmd.begin_date, cmd.end_date)?;
        if self.absence_request(cmd.request_id).is_some() {
            return Err(DomainError::conflict("absence request already exists"));
        }
        let code = required_code(&cmd.code)?;
        Ok(vec![LedgerEvent::AbsenceRequestSubmitted {
            request: AbsenceRequest {
                id: cmd.request_id,
                employee_id: cmd.employee_id,
                matricule: cmd.matricule.clone(),
                absence_code: code,
                absence_name: cmd.name.trim().to_string(),
                begin_date: cmd.begin_date,
                end_date: cmd.end_date,
                documents: cmd.documents.clone(),
                status: AbsenceRequestStatus::Pending,
                requested_at: cmd.occurred_at,
                decided_at: None,
            },
        }])
    }

    fn handle_decide(&self, cmd: &DecideAbsenceRequest) -> Result<Vec<LedgerEvent>, DomainError> {
        let request = self
            .absence_request(cmd.request_id)
            .ok_or_else(|| DomainError::not_found("absence request"))?;

        match request.status.decide(cmd.decision)? {
            AbsenceRequestStatus::Approved => Ok(vec![LedgerEvent::AbsenceRequestApproved {
                request_id: request.id,
                matricule: request.matricule.clone(),
                code: request.absence_code.clone(),
                start_date: request.begin_date,
                end_date: request.end_date,
                documents: request.documents.clone(),
                occurred_at: cmd.occurred_at,
            }]),
            _ => Ok(vec![LedgerEvent::AbsenceRequestRejected {
                request_id: request.id,
                occurred_at: cmd.occurred_at,
            }]),
        }
    }

    /// Only a pending request can be withdrawn. Once decided it is part of
    /// the payroll history.
    fn handle_delete(&self, cmd: &DeleteAbsenceRequest) -> Result<Vec<LedgerEvent>, DomainError> {
        let request = self
            .absence_request(cmd.request_id)
            .ok_or_else(|| DomainError::not_found("absence request"))?;
        if request.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "absence request is already {}",
                request.status.as_str()
            )));
        }
        Ok(vec![LedgerEvent::AbsenceRequestDeleted {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_close(&self, cmd: &CloseBatch) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.through_sequence > self.version {
            return Err(DomainError::validation(format!(
                "cannot close through sequence {} (ledger is at {})",
                cmd.through_sequence, self.version
            )));
        }
        if cmd.through_sequence <= self.closed_through {
            return Err(DomainError::invariant("batch already closed"));
        }
        let through = cmd.through_sequence;
        Ok(vec![LedgerEvent::BatchClosed {
            through_sequence: through,
            bonus_count: self.bonuses.iter().filter(|b| b.sequence <= through).count(),
            absence_count: self.absences.iter().filter(|a| a.sequence <= through).count(),
            occurred_at: cmd.occurred_at,
        }])
    }
}

fn required_code(raw: &str) -> Result<String, DomainError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(DomainError::validation("code must not be empty"));
    }
    Ok(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn mat(s: &str) -> Matricule {
        Matricule::parse(s).unwrap()
    }

    fn run(ledger: &mut PayrollLedger, cmd: LedgerCommand) -> Result<Vec<LedgerEvent>, DomainError> {
        let events = ledger.handle(&cmd)?;
        for e in &events {
            ledger.apply(e);
        }
        Ok(events)
    }

    fn bonus(m: &str, code: &str, value: f64) -> LedgerCommand {
        LedgerCommand::RecordBonus(RecordBonus {
            matricule: mat(m),
            code: code.into(),
            value,
            occurred_at: Utc::now(),
        })
    }

    fn submit(ledger: &mut PayrollLedger) -> AbsenceRequestId {
        let request_id = AbsenceRequestId::new();
        run(
            ledger,
            LedgerCommand::SubmitAbsenceRequest(SubmitAbsenceRequest {
                request_id,
                employee_id: EmployeeId::new(),
                matricule: mat("A"),
                code: "CP".into(),
                name: "Congés payés".into(),
                begin_date: day(2024, 3, 4),
                end_date: day(2024, 3, 8),
                documents: vec![],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        request_id
    }

    fn decide(id: AbsenceRequestId, decision: AbsenceDecision) -> LedgerCommand {
        LedgerCommand::DecideAbsenceRequest(DecideAbsenceRequest {
            request_id: id,
            decision,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn stream_id_is_derived_from_entity() {
        let entity = EntityId::new();
        let ledger = PayrollLedger::empty(entity);
        assert_eq!(ledger.id().as_uuid(), entity.as_uuid());
    }

    #[test]
    fn entries_carry_their_stream_sequence() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        run(&mut ledger, bonus("A", "P1", 100.0)).unwrap();
        run(&mut ledger, bonus("B", "P1", 50.0)).unwrap();
        let seqs: Vec<_> = ledger.pending_bonuses().iter().map(|b| b.sequence).collect();
        assert_eq!(seqs, [1, 2]);
        assert_eq!(ledger.version(), 2);
    }

    #[test]
    fn non_finite_bonus_is_rejected() {
        let ledger = PayrollLedger::empty(EntityId::new());
        assert!(ledger.handle(&bonus("A", "P1", f64::NAN)).is_err());
        assert!(ledger.handle(&bonus("A", "P1", f64::INFINITY)).is_err());
    }

    #[test]
    fn absence_period_must_be_ordered() {
        let ledger = PayrollLedger::empty(EntityId::new());
        let cmd = LedgerCommand::RecordAbsence(RecordAbsence {
            matricule: mat("A"),
            code: "RTT".into(),
            start_date: day(2024, 1, 2),
            end_date: day(2024, 1, 1),
            documents: vec![],
            occurred_at: Utc::now(),
        });
        assert!(matches!(ledger.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn advance_must_be_positive() {
        let ledger = PayrollLedger::empty(EntityId::new());
        let cmd = |amount| {
            LedgerCommand::RequestAdvance(RequestAdvance {
                employee_id: EmployeeId::new(),
                amount,
                reason: "loyer".into(),
                occurred_at: Utc::now(),
            })
        };
        assert!(ledger.handle(&cmd(0.0)).is_err());
        assert!(ledger.handle(&cmd(-5.0)).is_err());
        assert_eq!(ledger.handle(&cmd(200.0)).unwrap().len(), 1);
    }

    #[test]
    fn approval_appends_exactly_one_absence() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        assert!(ledger.pending_absences().is_empty());

        let events = run(&mut ledger, decide(id, AbsenceDecision::Approve)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(ledger.pending_absences().len(), 1);
        let entry = &ledger.pending_absences()[0];
        assert_eq!(entry.code, "CP");
        assert_eq!(entry.value, 1);
        assert_eq!(entry.source, AbsenceSource::Request(id));
        assert_eq!(ledger.absence_request(id).unwrap().status, AbsenceRequestStatus::Approved);
    }

    #[test]
    fn second_decision_is_refused_and_appends_nothing() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        run(&mut ledger, decide(id, AbsenceDecision::Approve)).unwrap();
        let version = ledger.version();

        for d in [AbsenceDecision::Approve, AbsenceDecision::Reject] {
            let err = run(&mut ledger, decide(id, d)).unwrap_err();
            assert!(matches!(err, DomainError::InvariantViolation(_)));
        }
        assert_eq!(ledger.version(), version);
        assert_eq!(ledger.pending_absences().len(), 1);
    }

    #[test]
    fn rejection_appends_no_absence() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        run(&mut ledger, decide(id, AbsenceDecision::Reject)).unwrap();
        assert!(ledger.pending_absences().is_empty());
        assert_eq!(ledger.absence_request(id).unwrap().status, AbsenceRequestStatus::Rejected);
    }

    #[test]
    fn unknown_request_is_not_found() {
        let ledger = PayrollLedger::empty(EntityId::new());
        let err = ledger
            .handle(&decide(AbsenceRequestId::new(), AbsenceDecision::Approve))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn deleted_request_disappears() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        run(
            &mut ledger,
            LedgerCommand::DeleteAbsenceRequest(DeleteAbsenceRequest {
                request_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(ledger.absence_request(id).is_none());
    }

    #[test]
    fn decided_request_cannot_be_deleted() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        run(&mut ledger, decide(id, AbsenceDecision::Approve)).unwrap();
        let before = ledger.version();

        let err = run(
            &mut ledger,
            LedgerCommand::DeleteAbsenceRequest(DeleteAbsenceRequest {
                request_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(ledger.version(), before);
        assert_eq!(ledger.absence_request(id).unwrap().status, AbsenceRequestStatus::Approved);
    }

    #[test]
    fn close_batch_keeps_later_entries() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        run(&mut ledger, bonus("A", "P1", 150.0)).unwrap();
        let through = ledger.version();
        run(&mut ledger, bonus("B", "P1", 20.0)).unwrap();

        run(
            &mut ledger,
            LedgerCommand::CloseBatch(CloseBatch {
                through_sequence: through,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(ledger.pending_bonuses().len(), 1);
        assert_eq!(ledger.pending_bonuses()[0].matricule.as_str(), "B");
        assert_eq!(ledger.closed_through(), through);
    }

    #[test]
    fn close_batch_twice_is_refused() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        run(&mut ledger, bonus("A", "P1", 1.0)).unwrap();
        let close = |through| {
            LedgerCommand::CloseBatch(CloseBatch {
                through_sequence: through,
                occurred_at: Utc::now(),
            })
        };
        run(&mut ledger, close(1)).unwrap();
        assert!(matches!(run(&mut ledger, close(1)), Err(DomainError::InvariantViolation(_))));
        assert!(matches!(run(&mut ledger, close(99)), Err(DomainError::Validation(_))));
    }

    #[test]
    fn events_round_trip_through_json() {
        let mut ledger = PayrollLedger::empty(EntityId::new());
        let id = submit(&mut ledger);
        let events = ledger.handle(&decide(id, AbsenceDecision::Approve)).unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "absence_request_approved");
        assert_eq!(json["start_date"], "2024-03-04");
        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
    }

    proptest! {
        /// Closing the batch at any point leaves exactly the entries appended
        /// after that point.
        #[test]
        fn batch_boundary_partitions_entries(before in 0usize..8, after in 0usize..8) {
            let mut ledger = PayrollLedger::empty(EntityId::new());
            for i in 0..before {
                run(&mut ledger, bonus("A", "P1", i as f64)).unwrap();
            }
            if before > 0 {
                let through = ledger.version();
                run(&mut ledger, LedgerCommand::CloseBatch(CloseBatch {
                    through_sequence: through,
                    occurred_at: Utc::now(),
                })).unwrap();
            }
            for i in 0..after {
                run(&mut ledger, bonus("B", "P1", i as f64)).unwrap();
            }
            prop_assert_eq!(ledger.pending_bonuses().len(), after);
            prop_assert!(ledger.pending_bonuses().iter().all(|b| b.matricule.as_str() == "B"));
        }
    }
}
