use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use showcasa_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::socket::connection_stats;
use crate::AppState;

/// Reports how many users and connections the socket layer currently holds.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let sockets_check = match connection_stats(&state.io) {
        Ok(stats) => HealthCheck {
            message: Some(format!("{} users, {} connections", stats.users, stats.connections)),
            ..HealthCheck::healthy("sockets")
        },
        Err(e) => HealthCheck::unhealthy("sockets", e.to_string()),
    };

    let response = HealthResponse::healthy("showcasa-gateway", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![sockets_check]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
