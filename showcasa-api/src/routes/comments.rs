use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::api::ApiResponse;
use showcasa_shared::types::auth::AuthUser;

use crate::services::comments::{self, CommentView};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "comment must be 1-2000 characters"))]
    pub content: String,
}

/// Field-level validator errors go out in the error envelope's `details`.
fn validation_error(e: validator::ValidationErrors) -> AppError {
    match serde_json::to_value(&e) {
        Ok(details) => AppError::with_details(ErrorCode::ValidationError, "invalid request body", details),
        Err(_) => AppError::new(ErrorCode::ValidationError, e.to_string()),
    }
}

/// GET /artworks/:id/comments (public)
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(artwork_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<CommentView>>>> {
    Ok(Json(ApiResponse::ok(comments::list_comments(&state, artwork_id)?)))
}

/// POST /artworks/:id/comments
pub async fn add_comment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(artwork_id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<Json<ApiResponse<CommentView>>> {
    req.validate().map_err(validation_error)?;

    let comment = comments::add_comment(&state, user.id, artwork_id, &req.content).await?;
    Ok(Json(ApiResponse::ok(comment)))
}

/// DELETE /comments/:id
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    comments::delete_comment(&state, user.id, comment_id)?;
    Ok(Json(ApiResponse::ok_with_message((), "comment deleted")))
}
