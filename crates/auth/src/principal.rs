use easypaies_core::{EmployeeId, EntityId, ManagementId};

use crate::account::UserAccount;
use crate::roles::Role;

/// A role together with the company link that role is meaningful with.
///
/// Built from the stored account on every request so code downstream can
/// match on the variant instead of checking `role` strings and optional
/// fields separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User,
    Admin,
    Manager {
        management: Option<ManagementId>,
    },
    Employer {
        entity: Option<EntityId>,
    },
    Employee {
        entity: Option<EntityId>,
        employee: Option<EmployeeId>,
    },
}

impl Principal {
    pub fn from_account(account: &UserAccount) -> Self {
        match account.role {
            Role::User => Principal::User,
            Role::Admin => Principal::Admin,
            Role::Manager => Principal::Manager {
                management: account.manager_of,
            },
            Role::Employer => Principal::Employer {
                entity: account.customer_of,
            },
            Role::Employee => Principal::Employee {
                entity: account.customer_of,
                employee: account.employee_id,
            },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Principal::User => Role::User,
            Principal::Admin => Role::Admin,
            Principal::Manager { .. } => Role::Manager,
            Principal::Employer { .. } => Role::Employer,
            Principal::Employee { .. } => Role::Employee,
        }
    }

    /// Client entity the principal belongs to, if any.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Principal::Employer { entity } | Principal::Employee { entity, .. } => *entity,
            _ => None,
        }
    }

    pub fn management(&self) -> Option<ManagementId> {
        match self {
            Principal::Manager { management } => *management,
            _ => None,
        }
    }
}
