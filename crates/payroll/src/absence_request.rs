//! Employee-initiated absence requests and their status machine.
//!
//! `Pending` is the only state that accepts a decision; `Approved` and
//! `Rejected` are terminal.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use easypaies_core::{AbsenceRequestId, DomainError, DomainResult, EmployeeId, Matricule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsenceRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl AbsenceRequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AbsenceRequestStatus::Pending)
    }

    /// Target state of a decision taken from `self`.
    pub fn decide(self, decision: AbsenceDecision) -> DomainResult<AbsenceRequestStatus> {
        if self.is_terminal() {
            return Err(DomainError::invariant(format!("absence request is already {}", self.as_str())));
        }
        Ok(match decision {
            AbsenceDecision::Approve => AbsenceRequestStatus::Approved,
            AbsenceDecision::Reject => AbsenceRequestStatus::Rejected,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbsenceRequestStatus::Pending => "pending",
            AbsenceRequestStatus::Approved => "approved",
            AbsenceRequestStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsenceDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceRequest {
    pub id: AbsenceRequestId,
    pub employee_id: EmployeeId,
    pub matricule: Matricule,
    pub absence_code: String,
    pub absence_name: String,
    pub begin_date: NaiveDate,
    pub end_date: NaiveDate,
    pub documents: Vec<String>,
    pub status: AbsenceRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_accepts_either_decision() {
        let s = AbsenceRequestStatus::Pending;
        assert_eq!(s.decide(AbsenceDecision::Approve).unwrap(), AbsenceRequestStatus::Approved);
        assert_eq!(s.decide(AbsenceDecision::Reject).unwrap(), AbsenceRequestStatus::Rejected);
    }

    #[test]
    fn terminal_states_refuse_decisions() {
        for s in [AbsenceRequestStatus::Approved, AbsenceRequestStatus::Rejected] {
            for d in [AbsenceDecision::Approve, AbsenceDecision::Reject] {
                assert!(matches!(s.decide(d), Err(DomainError::InvariantViolation(_))));
            }
        }
    }

    #[test]
    fn decisions_deserialize_lowercase() {
        let d: AbsenceDecision = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(d, AbsenceDecision::Approve);
    }
}
