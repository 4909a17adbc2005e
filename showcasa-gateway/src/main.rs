use std::time::Duration;

use showcasa_gateway::config::AppConfig;
use showcasa_gateway::relay::{run_relay, Backoff};
use showcasa_shared::clients::redis::RedisSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    showcasa_shared::middleware::init_tracing("showcasa-gateway");
    let metrics_handle = showcasa_shared::middleware::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;
    tracing::info!(auth_mode = ?config.auth_mode, "socket identity mode");

    let subscriber = RedisSubscriber::new(&config.redis_url)?;
    let backoff = Backoff::new(
        Duration::from_millis(config.resubscribe_initial_backoff_ms),
        Duration::from_millis(config.resubscribe_max_backoff_ms),
    );

    let (app, state) = showcasa_gateway::app(config, metrics_handle);

    // The relay retries on its own, so an unreachable broker does not block startup.
    tokio::spawn(run_relay(subscriber, state.io.clone(), backoff));

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "showcasa-gateway starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
