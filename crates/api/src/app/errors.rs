use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use easypaies_auth::{CredentialError, GuardError, SessionError};
use easypaies_core::DomainError;
use easypaies_infra::command_dispatcher::DispatchError;
use easypaies_infra::notify::MailError;
use easypaies_infra::storage::StorageError;

use crate::config::ConfigError;

pub const SUSPENDED_MESSAGE: &str = "Votre entreprise a été suspendue";
pub const GENERIC_SERVER_MESSAGE: &str = "Something went very wrong!";

/// Every failure a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Votre entreprise a été suspendue")]
    Suspended,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Mail or storage failure, including timeouts.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden(GuardError::Forbidden.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::Suspended => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }
        json_error(status, message)
    }
}

/// `{status: "fail" | "error", message}`; "fail" for client errors.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let label = if status.is_server_error() { "error" } else { "fail" };
    (
        status,
        axum::Json(json!({
            "status": label,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AppError::Validation(msg),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::NotFound(what) => AppError::NotFound(format!("No {what} found with that ID")),
            DomainError::Suspended(_) => AppError::Suspended,
            DomainError::Unauthorized => AppError::forbidden(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => AppError::Validation(msg),
            DispatchError::InvariantViolation(msg) | DispatchError::Concurrency(msg) => AppError::Conflict(msg),
            DispatchError::NotFound(what) => AppError::NotFound(format!("No {what} found with that ID")),
            DispatchError::Suspended(_) => AppError::Suspended,
            DispatchError::Unauthorized | DispatchError::EntityIsolation(_) => AppError::forbidden(),
            other @ (DispatchError::Deserialize(_) | DispatchError::Store(_) | DispatchError::Publish(_)) => {
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        if err.is_forbidden() {
            AppError::Forbidden(err.to_string())
        } else {
            AppError::Unauthenticated(err.to_string())
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Encode(e) => AppError::Internal(format!("token encoding failed: {e}")),
            SessionError::Decode(_) | SessionError::Window(_) => GuardError::InvalidToken.into(),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::TooShort => AppError::Validation(err.to_string()),
            CredentialError::Hash(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::NoRecipient(what) => AppError::Validation(format!("no e-mail address configured for {what}")),
            other => AppError::Upstream(format!("There was an error sending the email. Try again later! ({other})")),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        if err.is_rejection() {
            AppError::Validation(err.to_string())
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errs
            .field_errors()
            .into_iter()
            .flat_map(|(field, list)| {
                list.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field}: invalid value ({})", e.code),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join(". "))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("malformed multipart body: {}", err.body_text()))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("invalid JSON in form field: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_errors_keep_their_messages() {
        let err: AppError = GuardError::MissingToken.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "You are not logged in! Please log in to get access.");

        let err: AppError = GuardError::Forbidden.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn terminal_transitions_are_conflicts() {
        let err: AppError = DispatchError::InvariantViolation("absence request is already approved".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn suspension_has_a_fixed_message() {
        let err: AppError = DomainError::suspended("entity Boulangerie").into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), SUSPENDED_MESSAGE);
    }

    #[test]
    fn mail_timeouts_are_server_errors() {
        let err: AppError = MailError::Timeout(std::time::Duration::from_secs(1)).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_rejections_are_client_errors() {
        let err: AppError = StorageError::UnsupportedType("text/plain".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
