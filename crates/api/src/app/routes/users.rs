use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::Path,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use easypaies_auth::Role;
use easypaies_core::UserId;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::{JsonBody, ValidJson, many, message, one, parse_id};
use crate::app::services::AppServices;
use crate::app::session::send_session;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    let open = Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/signup-client", post(signup_client))
        .route("/resetPassword", patch(reset_password));

    let guarded = Router::new()
        .route("/change-password", post(change_password))
        .route("/init-password", post(init_password))
        .route("/me", get(me))
        .route("/updateMe", patch(update_me))
        .route("/email-verification", post(send_email_verification))
        .route("/verify-email", post(verify_email))
        .route("/", get(list_users))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(from_fn_with_state(services.clone(), protect));

    open.merge(guarded)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> Result<Response, AppError> {
    let email = body.email.filter(|e| !e.trim().is_empty());
    let password = body.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::validation("Please provide email and password!"));
    };
    let account = services.login(&email, &password)?;
    send_session(&services, &account, StatusCode::OK)
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<dto::SignupRequest>,
) -> Result<Response, AppError> {
    let account = services.signup(body)?;
    send_session(&services, &account, StatusCode::CREATED)
}

pub async fn signup_client(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<dto::SignupClientRequest>,
) -> Result<Response, AppError> {
    let account = services.signup_client(body).await?;
    send_session(&services, &account, StatusCode::CREATED)
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<dto::ResetPasswordRequest>,
) -> Result<Response, AppError> {
    services.reset_password(&body.email).await?;
    Ok(message(StatusCode::OK, "Token sent to email!"))
}

pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::ChangePasswordRequest>,
) -> Result<Response, AppError> {
    let account = services.change_password(&user, &body)?;
    send_session(&services, &account, StatusCode::OK)
}

pub async fn init_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::InitPasswordRequest>,
) -> Result<Response, AppError> {
    let account = services.init_password(&user, &body)?;
    send_session(&services, &account, StatusCode::OK)
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let account = services.current_account(&user)?;
    Ok(one(StatusCode::OK, account))
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    JsonBody(body): JsonBody<dto::UpdateMeRequest>,
) -> Result<Response, AppError> {
    let account = services.update_me(&user, body)?;
    Ok(one(StatusCode::OK, account))
}

pub async fn send_email_verification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    services.send_email_verification(&user).await?;
    Ok(message(StatusCode::OK, "Verification code sent to email!"))
}

pub async fn verify_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::VerifyEmailRequest>,
) -> Result<Response, AppError> {
    let account = services.verify_email(&user, &body.code)?;
    Ok(one(StatusCode::OK, account))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    Ok(many(services.list_users()))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: UserId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.find_user(id)?))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateUserRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: UserId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.update_user(id, &body)?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: UserId = parse_id(&id)?;
    services.deactivate_user(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
