use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Multipart, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use easypaies_auth::Role;
use easypaies_core::{EmployeeId, EntityId};
use easypaies_payroll::EmployeeStatus;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::uploads::FormParts;
use crate::app::routes::{ValidJson, many, one, parse_id};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(list_employees))
        .route("/fromManager", post(create_short_employee))
        .route("/salary-validation", post(salary_validation))
        .route("/absence/:id", post(declare_absence))
        .route(
            "/:id",
            post(create_employee)
                .get(get_employee)
                .patch(update_employee)
                .delete(delete_employee),
        )
        .route_layer(from_fn_with_state(services.clone(), protect))
}

/// Multipart create shared by `/employees/:id` and `/formemployees/:id`,
/// where `:id` is the entity.
pub(super) async fn create_in_entity(
    services: &AppServices,
    user: &CurrentUser,
    entity: &str,
    multipart: Multipart,
    draft: bool,
) -> Result<Response, AppError> {
    let entity: EntityId = parse_id(entity)?;
    let mut form = FormParts::read(multipart).await?;
    let input: dto::EmployeeInput = form.data()?;
    let docs = form.take_files("docs");
    let employee = services.create_employee(user, entity, input, docs, draft).await?;
    Ok(one(StatusCode::CREATED, employee))
}

pub(super) async fn update_with_status(
    services: &AppServices,
    user: &CurrentUser,
    id: &str,
    status: EmployeeStatus,
    body: dto::UpdateEmployeeRequest,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    let id: EmployeeId = parse_id(id)?;
    Ok(one(StatusCode::OK, services.update_employee(user, id, status, body).await?))
}

pub(super) fn delete_with_status(
    services: &AppServices,
    user: &CurrentUser,
    id: &str,
    status: EmployeeStatus,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    let id: EmployeeId = parse_id(id)?;
    services.delete_employee(user, id, status)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    Ok(many(services.list_employees(&user, EmployeeStatus::Active)))
}

pub async fn create_short_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::ShortEmployeeRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    Ok(one(StatusCode::CREATED, services.create_short_employee(&user, body)?))
}

pub async fn salary_validation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::SalaryValidationRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    let report = services.salary_validation(&user, body).await?;
    Ok((
        StatusCode::OK,
        axum::Json(json!({
            "status": "success",
            "message": "Salary validation sent",
            "delivered": report.delivered.len(),
        })),
    )
        .into_response())
}

/// Multipart: `data` holds the absence, `docs` the justification files.
pub async fn declare_absence(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id: EmployeeId = parse_id(&id)?;
    let mut form = FormParts::read(multipart).await?;
    let input: dto::DeclaredAbsenceInput = form.data()?;
    let docs = form.take_files("docs");
    let details = services.declare_employee_absence(&user, id, input, docs).await?;
    Ok(one(StatusCode::CREATED, details))
}

pub async fn create_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(entity): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    create_in_entity(&services, &user, &entity, multipart, false).await
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: EmployeeId = parse_id(&id)?;
    let employee = services.employee_with_status(&user, id, EmployeeStatus::Active)?;
    Ok(one(StatusCode::OK, employee))
}

pub async fn update_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateEmployeeRequest>,
) -> Result<Response, AppError> {
    update_with_status(&services, &user, &id, EmployeeStatus::Active, body).await
}

pub async fn delete_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    delete_with_status(&services, &user, &id, EmployeeStatus::Active)
}
