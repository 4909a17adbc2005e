use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod errors;
pub mod relay;
pub mod routes;
pub mod socket;

pub struct AppState {
    pub config: config::AppConfig,
    pub io: SocketIo,
    pub metrics_handle: PrometheusHandle,
}

/// Build the Socket.IO layer and the HTTP router around it. The returned state
/// carries the `SocketIo` handle the broker relay emits through.
pub fn app(config: config::AppConfig, metrics_handle: PrometheusHandle) -> (Router, Arc<AppState>) {
    let (sio_layer, io) = SocketIo::builder().build_layer();
    let state = Arc::new(AppState { config, io: io.clone(), metrics_handle });

    io.ns("/", {
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                socket::on_connect(socket, state).await;
            }
        }
    });

    let router = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (router, state)
}
