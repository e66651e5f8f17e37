//! Client company record and its pay-code catalogs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easypaies_core::{DomainError, DomainResult, EntityId, ManagementId, PayCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub management: ManagementId,
    /// URL of the uploaded company information document.
    pub informations: Option<String>,
    pub suspended: bool,
    /// Bonus catalog; its order is the column order of the bonus export.
    pub primes: Vec<PayCode>,
    pub absences: Vec<PayCode>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(name: impl Into<String>, management: ManagementId, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("entity name must not be empty"));
        }
        Ok(Self {
            id: EntityId::new(),
            name,
            management,
            informations: None,
            suspended: false,
            primes: Vec::new(),
            absences: Vec::new(),
            created_at: now,
        })
    }

    /// Replace both catalogs. Duplicate codes keep their first occurrence.
    pub fn set_catalogs(&mut self, primes: Vec<PayCode>, absences: Vec<PayCode>) {
        self.primes = dedup_codes(primes);
        self.absences = dedup_codes(absences);
    }

    pub fn require_prime(&self, code: &str) -> DomainResult<&PayCode> {
        find_code(&self.primes, code)
            .ok_or_else(|| DomainError::validation(format!("'{code}' is not in the bonus catalog of {}", self.name)))
    }

    pub fn require_absence(&self, code: &str) -> DomainResult<&PayCode> {
        find_code(&self.absences, code)
            .ok_or_else(|| DomainError::validation(format!("'{code}' is not in the absence catalog of {}", self.name)))
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if self.suspended {
            return Err(DomainError::suspended(format!("entity {}", self.name)));
        }
        Ok(())
    }
}

fn find_code<'a>(catalog: &'a [PayCode], code: &str) -> Option<&'a PayCode> {
    let code = code.trim();
    catalog.iter().find(|c| c.code == code)
}

fn dedup_codes(codes: Vec<PayCode>) -> Vec<PayCode> {
    let mut out: Vec<PayCode> = Vec::with_capacity(codes.len());
    for code in codes {
        if !out.iter().any(|c| c.code == code.code) {
            out.push(code);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> Entity {
        let mut e = Entity::new("Boulangerie Martin", ManagementId::new(), Utc::now()).unwrap();
        e.set_catalogs(
            vec![
                PayCode::new("P1", "Prime de panier").unwrap(),
                PayCode::new("P2", "Prime d'ancienneté").unwrap(),
                PayCode::new("P1", "doublon").unwrap(),
            ],
            vec![PayCode::new("RTT", "RTT").unwrap()],
        );
        e
    }

    #[test]
    fn catalogs_keep_first_occurrence_order() {
        let e = entity();
        let codes: Vec<_> = e.primes.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["P1", "P2"]);
        assert_eq!(e.primes[0].name, "Prime de panier");
    }

    #[test]
    fn catalog_lookup() {
        let e = entity();
        assert!(e.require_prime(" P2 ").is_ok());
        assert!(e.require_prime("RTT").is_err());
        assert!(e.require_absence("RTT").is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Entity::new("  ", ManagementId::new(), Utc::now()).is_err());
    }

    #[test]
    fn suspended_entity_is_not_active() {
        let mut e = entity();
        assert!(e.ensure_active().is_ok());
        e.suspended = true;
        assert!(matches!(e.ensure_active(), Err(DomainError::Suspended(_))));
    }
}
