use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use easypaies_auth::{check_session, extract_bearer};
use easypaies_infra::RecordStore;

use crate::app::errors::{AppError, GENERIC_SERVER_MESSAGE, json_error};
use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// Bearer-token guard. Binds [`CurrentUser`] for downstream handlers.
pub async fn protect(
    State(services): State<Arc<AppServices>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = extract_bearer(header)?;

    let claims = services.sessions.verify(token, Utc::now())?;
    let stored = services.users.get(&claims.sub).filter(|u| u.active);
    let account = check_session(&claims, stored.as_ref())?.clone();

    req.extensions_mut().insert(CurrentUser::new(account));
    Ok(next.run(req).await)
}

/// Production only: replace the body of every 5xx with a generic message.
/// The detail has already been logged by [`AppError`].
pub async fn mask_server_errors(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status().is_server_error() {
        return json_error(response.status(), GENERIC_SERVER_MESSAGE).into_response();
    }
    response
}
