use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Multipart, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
};

use easypaies_auth::Role;
use easypaies_core::AbsenceRequestId;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::uploads::FormParts;
use crate::app::routes::{ValidJson, many, one, parse_id};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

const DECIDERS: &[Role] = &[Role::Admin, Role::Manager, Role::Employer];

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(list_requests).post(submit_request))
        .route("/:id", get(get_request).patch(decide_request).delete(delete_request))
        .route_layer(from_fn_with_state(services.clone(), protect))
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    Ok(many(services.list_absence_requests(&user)?))
}

pub async fn submit_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Employer, Role::Employee])?;
    let mut form = FormParts::read(multipart).await?;
    let input: dto::AbsenceRequestInput = form.data()?;
    let docs = form.take_files("docs");
    let request = services.submit_absence_request(&user, input, docs).await?;
    Ok(one(StatusCode::CREATED, request))
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: AbsenceRequestId = parse_id(&id)?;
    let (request, _) = services.find_absence_request(&user, id)?;
    Ok(one(StatusCode::OK, request))
}

pub async fn decide_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::DecisionRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(DECIDERS)?;
    let id: AbsenceRequestId = parse_id(&id)?;
    let request = services.decide_absence_request(&user, id, body.decision).await?;
    Ok(one(StatusCode::OK, request))
}

pub async fn delete_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(DECIDERS)?;
    let id: AbsenceRequestId = parse_id(&id)?;
    services.delete_absence_request(&user, id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
