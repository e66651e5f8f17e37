use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    easypaies_observability::init();

    let config = easypaies_api::config::AppConfig::from_env().context("invalid configuration")?;
    let addr = format!("0.0.0.0:{}", config.port);
    let env = config.env;

    let (app, services) = easypaies_api::app::build_app(config)?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, env = ?env, "listening");

    let served = axum::serve(listener, app).await;
    services.shutdown();
    served.context("server error")
}
