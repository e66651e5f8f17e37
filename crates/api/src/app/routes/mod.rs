use std::sync::Arc;

use axum::{
    Json, Router,
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use validator::Validate;

use easypaies_core::DomainError;

use crate::app::errors::AppError;
use crate::app::services::AppServices;

pub mod absence_requests;
pub mod contact;
pub mod employees;
pub mod entities;
pub mod formemployees;
pub mod managements;
pub mod ressources;
pub mod system;
pub mod uploads;
pub mod users;

/// Every `/api/v1` route. Each area applies the session guard to its own
/// protected routes.
pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .nest("/users", users::router(services))
        .nest("/managements", managements::router(services))
        .nest("/entities", entities::router(services))
        .nest("/employees", employees::router(services))
        .nest("/formemployees", formemployees::router(services))
        .nest("/absence-requests", absence_requests::router(services))
        .nest("/ressources", ressources::router(services))
        .nest("/contact", contact::router(services))
}

/// `{status: "success", data: {data: doc}}`
pub fn one<T: Serialize>(status: StatusCode, doc: T) -> Response {
    (status, Json(json!({ "status": "success", "data": { "data": doc } }))).into_response()
}

/// `{status: "success", results: n, data: {data: [...]}}`
pub fn many<T: Serialize>(docs: Vec<T>) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "results": docs.len(), "data": { "data": docs } })),
    )
        .into_response()
}

pub fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "status": "success", "message": text }))).into_response()
}

pub fn parse_id<T>(raw: &str) -> Result<T, AppError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(AppError::from)
}

/// JSON body, deserialized then validated. Rejections come back in the
/// usual error shape.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// JSON body without validation rules. Only the rejection is mapped.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        Ok(JsonBody(value))
    }
}
