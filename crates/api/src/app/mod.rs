//! HTTP application wiring.
//!
//! - `services/`: stores, ledger dispatcher, notifications and uploads
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request bodies and their validation
//! - `session.rs`: the token + cookie response sent after authentication
//! - `errors.rs`: the error taxonomy and its JSON shape

use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use easypaies_infra::notify::LogMailer;
use easypaies_infra::storage::InMemoryDocumentStore;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;
pub mod session;

use services::AppServices;

/// Services with the default transports: mail is logged and documents are
/// kept in memory under `DOCS_BASE_URL`.
pub fn build_services(config: AppConfig) -> anyhow::Result<Arc<AppServices>> {
    let documents = Arc::new(InMemoryDocumentStore::new(
        config.docs_bucket.clone(),
        config.docs_base_url.clone(),
    ));
    Ok(Arc::new(AppServices::build(config, Arc::new(LogMailer), documents)?))
}

/// The full router: `/health` plus every resource under `/api/v1`.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let production = services.config.env.is_production();

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router(&services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(routes::uploads::MAX_BODY_BYTES))
                .layer(Extension(services)),
        );

    if production {
        app.layer(axum::middleware::from_fn(middleware::mask_server_errors))
    } else {
        app
    }
}

/// Public entrypoint used by `main.rs`.
pub fn build_app(config: AppConfig) -> anyhow::Result<(Router, Arc<AppServices>)> {
    let services = build_services(config)?;
    Ok((build_router(Arc::clone(&services)), services))
}
