use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::ApiResponse;
use showcasa_shared::types::auth::AuthUser;
use showcasa_shared::types::event::MessageRecord;
use showcasa_shared::types::pagination::{Paginated, PaginationParams};

use crate::services::{chats, messages};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub total_unread: i64,
}

/// GET /chats/:id/messages
pub async fn get_messages(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<MessageRecord>>>> {
    let page = messages::get_messages(&state, user.id, chat_id, &params)?;
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /chats/:id/messages
pub async fn add_message(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<MessageRecord>>> {
    let message = messages::add_message(&state, user.id, chat_id, &req.content).await?;
    Ok(Json(ApiResponse::ok(message)))
}

/// GET /messages/unread-count
pub async fn get_total_unread_count(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let total_unread = chats::get_total_unread_count(&state, user.id)?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { total_unread })))
}
