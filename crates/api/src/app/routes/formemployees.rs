//! HR forms: employees in `Draft` status, filled by the client and promoted
//! by the payroll office.

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Multipart, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post},
};

use easypaies_auth::Role;
use easypaies_core::EmployeeId;
use easypaies_payroll::EmployeeStatus;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::employees::{create_in_entity, delete_with_status, update_with_status};
use crate::app::routes::{ValidJson, many, one, parse_id};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(list_forms))
        .route(
            "/:id",
            post(create_form).get(get_form).patch(update_form).delete(delete_form),
        )
        .route("/:id/promote", post(promote_form))
        .route_layer(from_fn_with_state(services.clone(), protect))
}

pub async fn list_forms(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    Ok(many(services.list_employees(&user, EmployeeStatus::Draft)))
}

pub async fn create_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(entity): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    create_in_entity(&services, &user, &entity, multipart, true).await
}

pub async fn get_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    let id: EmployeeId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.employee_with_status(&user, id, EmployeeStatus::Draft)?))
}

pub async fn update_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateEmployeeRequest>,
) -> Result<Response, AppError> {
    update_with_status(&services, &user, &id, EmployeeStatus::Draft, body).await
}

pub async fn delete_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    delete_with_status(&services, &user, &id, EmployeeStatus::Draft)
}

pub async fn promote_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::PromoteRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    let id: EmployeeId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.promote_employee(&user, id, body)?))
}
