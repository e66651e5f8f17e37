use std::sync::Arc;

use axum::{
    Extension, Router,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post},
};

use easypaies_auth::Role;
use easypaies_payroll::RessourceKind;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::{ValidJson, many, one};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/absences", get(list_absences))
        .route("/primes", get(list_primes))
        .route("/", post(create_ressource))
        .route_layer(from_fn_with_state(services.clone(), protect))
}

pub async fn list_absences(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, AppError> {
    Ok(many(services.list_ressources(RessourceKind::Absence)))
}

pub async fn list_primes(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, AppError> {
    Ok(many(services.list_ressources(RessourceKind::Prime)))
}

pub async fn create_ressource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(body): ValidJson<dto::CreateRessourceRequest>,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin])?;
    Ok(one(StatusCode::CREATED, services.create_ressource(body)?))
}
