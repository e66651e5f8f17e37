use core::str::FromStr;

use serde::{Deserialize, Serialize};

use easypaies_core::DomainError;

/// Closed set of roles a user account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    /// Staff of a payroll-service provider (`manager_of`).
    Manager,
    /// Client company owner (`customer_of`).
    Employer,
    /// Client company staff member with a linked employee record.
    Employee,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::User, Role::Admin, Role::Manager, Role::Employer, Role::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employer => "employer",
            Role::Employee => "employee",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Employer".parse::<Role>().unwrap(), Role::Employer);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Manager).unwrap(), "\"manager\"");
        assert_eq!(Role::default(), Role::User);
    }
}
