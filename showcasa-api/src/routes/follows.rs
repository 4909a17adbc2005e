use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::{ApiResponse, Outcome};
use showcasa_shared::types::auth::AuthUser;
use showcasa_shared::types::event::UserSummary;

use crate::models::Follow;
use crate::services::follows;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatusResponse {
    pub is_following: bool,
}

/// POST /users/:id/follow
pub async fn follow(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Outcome<Follow>>>> {
    let outcome = follows::follow(&state, user.id, target_id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /users/:id/follow
pub async fn unfollow(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Outcome<()>>>> {
    let outcome = follows::unfollow(&state, user.id, target_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /users/:id/follow
pub async fn is_following(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FollowStatusResponse>>> {
    let is_following = follows::is_following(&state, user.id, target_id)?;
    Ok(Json(ApiResponse::ok(FollowStatusResponse { is_following })))
}

/// GET /users/:id/followers (public)
pub async fn list_followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    Ok(Json(ApiResponse::ok(follows::list_followers(&state, user_id)?)))
}

/// GET /users/:id/following (public)
pub async fn list_following(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<UserSummary>>>> {
    Ok(Json(ApiResponse::ok(follows::list_following(&state, user_id)?)))
}
