use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Multipart, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use easypaies_auth::Role;
use easypaies_core::EntityId;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::uploads::FormParts;
use crate::app::routes::{ValidJson, many, message, one, parse_id};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(list_entities).post(create_entity))
        .route("/:id", get(get_entity).patch(update_entity).delete(delete_entity))
        .route("/updateInformations/:id", patch(update_informations))
        .route("/absence/:id", patch(record_absence))
        .route("/addSalaryElements/:id", patch(add_salary_elements))
        .route("/generatePaySlips/:id", patch(generate_payslips))
        .route("/advance/:id", post(request_advance))
        .route("/:id/primes", get(bonus_catalog))
        .route("/:id/absences", get(absence_catalog))
        .route("/:id/ledger", get(ledger))
        .route_layer(from_fn_with_state(services.clone(), protect))
}

pub async fn create_entity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::CreateEntityRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    Ok(one(StatusCode::CREATED, services.create_entity(&user, body)?))
}

pub async fn list_entities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    Ok(many(services.visible_entities(&user)))
}

pub async fn get_entity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.entity_in_scope(&user, id)?))
}

pub async fn update_entity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateEntityRequest>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.update_entity(&user, id, body)?))
}

pub async fn delete_entity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    let id: EntityId = parse_id(&id)?;
    services.delete_entity(&user, id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn update_informations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    let mut form = FormParts::read(multipart).await?;
    let document = form.take_single("informations")?;
    Ok(one(StatusCode::OK, services.update_informations(&user, id, document).await?))
}

/// Multipart: `data` holds the absence, `docs` the justification files.
pub async fn record_absence(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    let mut form = FormParts::read(multipart).await?;
    let input: dto::AbsenceInput = form.data()?;
    let docs = form.take_files("docs");
    let details = services.record_entity_absence(&user, id, input, docs).await?;
    Ok(one(StatusCode::OK, details))
}

pub async fn add_salary_elements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::SalaryElementsRequest>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    let lines = services.add_salary_elements(&user, id, body).await?;
    Ok(many(lines))
}

pub async fn generate_payslips(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    let id: EntityId = parse_id(&id)?;
    let summary = services.export_and_clear(&user, id).await?;
    Ok(one(StatusCode::OK, summary))
}

pub async fn request_advance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::AdvanceRequestBody>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    services.request_advance(&user, id, body).await?;
    Ok(message(StatusCode::CREATED, "Advance request sent"))
}

pub async fn bonus_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    Ok(many(services.bonus_catalog(&user, id)?))
}

pub async fn absence_catalog(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    Ok(many(services.absence_catalog(&user, id)?))
}

pub async fn ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: EntityId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.ledger_view(&user, id)?))
}
