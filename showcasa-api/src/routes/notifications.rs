use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::{ApiResponse, Outcome};
use showcasa_shared::types::auth::AuthUser;
use showcasa_shared::types::event::NotificationRecord;

use crate::services::notifications;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications
pub async fn get_notifications(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<NotificationRecord>>>> {
    Ok(Json(ApiResponse::ok(notifications::get_notifications(&state, user.id)?)))
}

/// GET /notifications/unread-count
pub async fn get_unread_count(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = notifications::get_unread_count(&state, user.id)?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

/// POST /notifications/:id/read
pub async fn mark_as_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Outcome<NotificationRecord>>>> {
    let outcome = notifications::mark_as_read(&state, user.id, notification_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}
