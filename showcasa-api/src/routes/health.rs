use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use showcasa_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// Checks the record store and reports the broker connection state. A
/// disconnected broker only degrades the service: writes still commit.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store_check = match state.store().begin() {
        Ok(session) => {
            let _ = session.abort();
            HealthCheck::healthy(state.store().kind())
        }
        Err(e) => HealthCheck::unhealthy(state.store().kind(), e.to_string()),
    };

    let broker_check = if state.broker().is_connected() {
        HealthCheck::healthy("broker")
    } else {
        HealthCheck::degraded("broker", "not connected")
    };

    let response = HealthResponse::healthy("showcasa-api", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![store_check, broker_check]);

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
