//! Per-request access checks.
//!
//! The HTTP middleware composes these in order: [`extract_bearer`], then
//! [`SessionIssuer::verify`](crate::SessionIssuer::verify), then a user
//! lookup, then [`check_session`]. Route groups add [`restrict_to`].

use thiserror::Error;

use crate::account::UserAccount;
use crate::claims::SessionClaims;
use crate::roles::Role;

/// Why a request was turned away. The messages are user-facing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("You are not logged in! Please log in to get access.")]
    MissingToken,

    #[error("Invalid token. Please log in again.")]
    InvalidToken,

    #[error("The user belonging to this token does no longer exist.")]
    UnknownUser,

    #[error("User recently changed password! Please log in again.")]
    StaleSession,

    #[error("You do not have permission to perform this action")]
    Forbidden,
}

impl GuardError {
    /// 403 for role failures, 401 for everything else.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, GuardError::Forbidden)
    }
}

/// Pull the token out of an `Authorization` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, GuardError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(GuardError::MissingToken)?;
    if token.is_empty() {
        return Err(GuardError::MissingToken);
    }
    Ok(token)
}

/// Resolve verified claims against the stored account.
///
/// `account` is whatever the lookup of `claims.sub` produced; soft-deleted
/// accounts count as gone.
pub fn check_session<'a>(
    claims: &SessionClaims,
    account: Option<&'a UserAccount>,
) -> Result<&'a UserAccount, GuardError> {
    let account = account
        .filter(|a| a.active && a.id == claims.sub)
        .ok_or(GuardError::UnknownUser)?;
    if account.changed_password_after(claims.iat) {
        return Err(GuardError::StaleSession);
    }
    Ok(account)
}

pub fn restrict_to(role: Role, allowed: &[Role]) -> Result<(), GuardError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(GuardError::Forbidden)
    }
}
