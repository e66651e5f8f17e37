//! Small validated value types used as join keys in payroll data.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Characters that would corrupt a semicolon-delimited export row.
fn check_csv_safe(field: &str, value: &str) -> DomainResult<()> {
    if value.contains([';', '\n', '\r']) {
        return Err(DomainError::validation(format!(
            "{field} must not contain ';' or line breaks"
        )));
    }
    Ok(())
}

/// Employee badge number; the key of every ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Matricule(String);

impl Matricule {
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let value = raw.as_ref().trim();
        if value.is_empty() {
            return Err(DomainError::validation("matricule must not be empty"));
        }
        check_csv_safe("matricule", value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Matricule {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Matricule> for String {
    fn from(value: Matricule) -> Self {
        value.0
    }
}

impl core::fmt::Display for Matricule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry for a bonus or absence type: `{code, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayCode {
    pub code: String,
    pub name: String,
}

impl PayCode {
    pub fn new(code: impl AsRef<str>, name: impl Into<String>) -> DomainResult<Self> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(DomainError::validation("code must not be empty"));
        }
        check_csv_safe("code", code)?;
        Ok(Self {
            code: code.to_string(),
            name: name.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matricule_is_trimmed() {
        assert_eq!(Matricule::parse("  A12 ").unwrap().as_str(), "A12");
    }

    #[test]
    fn matricule_rejects_separator() {
        assert!(Matricule::parse("A;1").is_err());
        assert!(Matricule::parse("   ").is_err());
    }

    #[test]
    fn matricule_deserialization_validates() {
        let ok: Matricule = serde_json::from_str("\"007\"").unwrap();
        assert_eq!(ok.as_str(), "007");
        assert!(serde_json::from_str::<Matricule>("\"\"").is_err());
    }

    #[test]
    fn pay_code_rejects_line_breaks() {
        assert!(PayCode::new("P1\n", "Prime").is_ok(), "outer whitespace is trimmed");
        assert!(PayCode::new("P\n1", "Prime").is_err());
    }
}
