use easypaies_auth::{Principal, Role, UserAccount, restrict_to};
use easypaies_core::{EntityId, ManagementId, UserId};

use crate::app::errors::AppError;

/// The authenticated caller, bound into request extensions by
/// [`protect`](crate::middleware::protect).
///
/// Built from the stored account on every request, so role changes take
/// effect without a new token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    account: UserAccount,
    principal: Principal,
}

impl CurrentUser {
    pub fn new(account: UserAccount) -> Self {
        let principal = account.principal();
        Self { account, principal }
    }

    pub fn id(&self) -> UserId {
        self.account.id
    }

    pub fn account(&self) -> &UserAccount {
        &self.account
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn role(&self) -> Role {
        self.principal.role()
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.principal.entity()
    }

    pub fn management(&self) -> Option<ManagementId> {
        self.principal.management()
    }

    /// 403 unless the caller holds one of `roles`.
    pub fn restrict_to(&self, roles: &[Role]) -> Result<(), AppError> {
        restrict_to(self.role(), roles).map_err(AppError::from)
    }
}
