//! Global catalog of standard pay codes, offered to clients when they set
//! up an entity's own catalogs.

use serde::{Deserialize, Serialize};

use easypaies_core::{DomainResult, PayCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RessourceKind {
    Prime,
    Absence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ressource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RessourceKind,
    pub code: String,
}

impl Ressource {
    pub fn new(kind: RessourceKind, code: &str, name: &str) -> DomainResult<Self> {
        let pay_code = PayCode::new(code, name)?;
        Ok(Self {
            name: pay_code.name,
            kind,
            code: pay_code.code,
        })
    }

    /// Record-store key; a code is unique within its kind.
    pub fn key(&self) -> (RessourceKind, String) {
        (self.kind, self.code.clone())
    }

    pub fn pay_code(&self) -> PayCode {
        PayCode {
            code: self.code.clone(),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_upper_case() {
        let r = Ressource::new(RessourceKind::Prime, "P100", "Prime exceptionnelle").unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "PRIME");
        assert_eq!(json["code"], "P100");
    }

    #[test]
    fn codes_are_csv_safe() {
        assert!(Ressource::new(RessourceKind::Absence, "A;1", "Maladie").is_err());
    }
}
