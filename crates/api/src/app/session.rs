//! Session responses: token, cookie and the role-specific user view.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use easypaies_auth::{Role, UserAccount};
use easypaies_infra::RecordStore;
use easypaies_payroll::EmployeeSummary;

use crate::app::errors::AppError;
use crate::app::services::AppServices;

/// Extra data attached to a session depending on the role.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionView {
    /// The employee linked to the account, when one exists.
    Employee(Option<EmployeeSummary>),
    Plain,
}

impl SessionView {
    pub fn for_account(services: &AppServices, account: &UserAccount) -> Self {
        match account.role {
            Role::Employee => {
                let linked = services
                    .employees
                    .filter(&|e| e.user == Some(account.id))
                    .into_iter()
                    .next()
                    .map(|e| e.summary());
                SessionView::Employee(linked)
            }
            _ => SessionView::Plain,
        }
    }

    fn employee(&self) -> Option<&EmployeeSummary> {
        match self {
            SessionView::Employee(summary) => summary.as_ref(),
            SessionView::Plain => None,
        }
    }
}

/// Issue a token for `account` and answer with it in the body and in the
/// `jwt` cookie.
pub fn send_session(services: &AppServices, account: &UserAccount, status: StatusCode) -> Result<Response, AppError> {
    let now = Utc::now();
    let issued = services.sessions.issue(account.id, now)?;
    let view = SessionView::for_account(services, account);

    let cookie = session_cookie(
        &issued.token,
        now + Duration::days(services.config.jwt_cookie_expires_days),
        services.config.env.is_production(),
    );
    let cookie = HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(format!("invalid cookie: {e}")))?;

    tracing::info!(user_id = %account.id, role = %account.role, "session issued");

    let body = json!({
        "status": "success",
        "token": issued.token,
        "data": {
            "user": account,
            "employee": view.employee(),
            "employeeId": account.employee_id,
        }
    });
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

pub fn session_cookie(token: &str, expires: DateTime<Utc>, secure: bool) -> String {
    let mut cookie = format!(
        "jwt={token}; Expires={}; Path=/; HttpOnly; SameSite=Lax",
        expires.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cookie_is_secure_only_in_production() {
        let expires = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let dev = session_cookie("abc", expires, false);
        assert_eq!(dev, "jwt=abc; Expires=Sat, 01 Mar 2025 08:30:00 GMT; Path=/; HttpOnly; SameSite=Lax");
        assert!(session_cookie("abc", expires, true).ends_with("; Secure"));
    }
}
