use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::ApiResponse;
use showcasa_shared::types::auth::AuthUser;

use crate::services::chats::{self, ChatExists, ChatView};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatRequest {
    pub user_id: Uuid,
}

/// GET /chats
pub async fn get_chats(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ChatView>>>> {
    Ok(Json(ApiResponse::ok(chats::get_chats(&state, user.id)?)))
}

/// POST /chats - find or create the chat with another user
pub async fn find_or_create_chat(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenChatRequest>,
) -> AppResult<Json<ApiResponse<ChatView>>> {
    Ok(Json(ApiResponse::ok(chats::find_or_create_chat(&state, user.id, req.user_id)?)))
}

/// GET /chats/exists/:user_id
pub async fn chat_exists(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(other_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ChatExists>>> {
    Ok(Json(ApiResponse::ok(chats::chat_exists(&state, user.id, other_id)?)))
}

/// GET /chats/:id
pub async fn get_chat(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ChatView>>> {
    Ok(Json(ApiResponse::ok(chats::get_chat(&state, user.id, chat_id)?)))
}

/// POST /chats/:id/read
pub async fn mark_as_read(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    chats::mark_as_read(&state, user.id, chat_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "chat marked as read")))
}
