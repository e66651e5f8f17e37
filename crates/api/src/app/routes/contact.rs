use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Multipart,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;

use easypaies_auth::Role;

use crate::app::dto;
use crate::app::errors::AppError;
use crate::app::routes::uploads::FormParts;
use crate::app::routes::{ValidJson, message};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::protect;

pub fn router(services: &Arc<AppServices>) -> Router {
    let guarded = Router::new()
        .route("/entity", post(entity_contact))
        .route_layer(from_fn_with_state(services.clone(), protect));

    Router::new().route("/", post(website_contact)).merge(guarded)
}

pub async fn website_contact(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<dto::WebsiteContactRequest>,
) -> Result<Response, AppError> {
    services.website_contact(body).await?;
    Ok(message(StatusCode::OK, "Message sent"))
}

/// Multipart: `data` holds the message, `docs` the attachments.
pub async fn entity_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    user.restrict_to(&[Role::Admin, Role::Manager, Role::Employer])?;
    let mut form = FormParts::read(multipart).await?;
    let input: dto::EntityContactInput = form.data()?;
    let docs = form.take_files("docs");
    let documents = services.entity_contact(&user, input, docs).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "success", "message": "Message sent", "documents": documents })),
    )
        .into_response())
}
