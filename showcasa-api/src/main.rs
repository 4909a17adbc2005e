use std::sync::Arc;

use showcasa_api::config::AppConfig;
use showcasa_api::services::retention::spawn_retention_task;
use showcasa_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    showcasa_shared::middleware::init_tracing("showcasa-api");
    let metrics_handle = showcasa_shared::middleware::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    let state = Arc::new(AppState::from_config(config, metrics_handle)?);
    tracing::info!(store = state.store().kind(), "record store ready");

    spawn_retention_task(state.clone());

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "showcasa-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
