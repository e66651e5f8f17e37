use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{Multipart, Path},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch},
};

use easypaies_auth::Role;
use easypaies_core::ManagementId;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::uploads::FormParts;
use crate::app::routes::{ValidJson, many, one, parse_id};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/", get(list_managements).post(create_management))
        .route(
            "/:id",
            get(get_management).patch(update_management).delete(delete_management),
        )
        .route("/suspend/:id", patch(suspend_management))
        .route("/reactive/:id", patch(reactivate_management))
        .route("/updateLogo/:id", patch(update_logo))
        .route_layer(from_fn_with_state(services.clone(), protect))
}

pub async fn create_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::CreateManagementRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let management = services.create_management(body)?;
    Ok(one(StatusCode::CREATED, management))
}

pub async fn list_managements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    Ok(many(services.list_managements(&user)))
}

pub async fn get_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: ManagementId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.management_in_scope(&user, id)?))
}

pub async fn update_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<dto::UpdateManagementRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    let id: ManagementId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.update_management(&user, id, &body)?))
}

pub async fn delete_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: ManagementId = parse_id(&id)?;
    services.delete_management(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn suspend_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: ManagementId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.set_management_suspension(id, true)?))
}

pub async fn reactivate_management(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    let id: ManagementId = parse_id(&id)?;
    Ok(one(StatusCode::OK, services.set_management_suspension(id, false)?))
}

pub async fn update_logo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager])?;
    let id: ManagementId = parse_id(&id)?;
    let mut form = FormParts::read(multipart).await?;
    let logo = form.take_single("logo")?;
    Ok(one(StatusCode::OK, services.update_logo(&user, id, logo).await?))
}
