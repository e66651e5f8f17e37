//! Payroll domain: client entities, managements, employees and the
//! per-entity payroll ledger with its CSV batch export.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod absence_request;
pub mod dates;
pub mod employee;
pub mod entity;
pub mod export;
pub mod ledger;
pub mod management;
pub mod ressource;

pub use absence_request::{AbsenceDecision, AbsenceRequest, AbsenceRequestStatus};
pub use employee::{
    DaySlots, Departure, Employee, EmployeeProfile, EmployeeStatus, EmployeeSummary, WeeklySchedule,
    ensure_unique_matricule,
};
pub use entity::Entity;
pub use export::{PayslipBatch, absence_csv, bonus_csv};
pub use ledger::{
    AbsenceEntry, AbsenceSource, AdvanceEntry, BonusEntry, CloseBatch, DecideAbsenceRequest,
    DeleteAbsenceRequest, LEDGER_AGGREGATE_TYPE, LedgerCommand, LedgerEvent, PayrollLedger, RecordAbsence,
    RecordBonus, RequestAdvance, SubmitAbsenceRequest,
};
pub use management::{
    ContactCategory, Management, ManagementContacts, UsageCounter, UsageCounters, apply_suspension,
};
pub use ressource::{Ressource, RessourceKind};
