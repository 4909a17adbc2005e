use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::{ApiResponse, Outcome};
use showcasa_shared::types::auth::AuthUser;

use crate::models::Like;
use crate::services::likes;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatusResponse {
    pub has_liked: bool,
}

/// POST /artworks/:id/like
pub async fn like(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(artwork_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Outcome<Like>>>> {
    let outcome = likes::like(&state, user.id, artwork_id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /artworks/:id/like
pub async fn unlike(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(artwork_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Outcome<()>>>> {
    let outcome = likes::unlike(&state, user.id, artwork_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// GET /artworks/:id/like
pub async fn has_liked(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(artwork_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeStatusResponse>>> {
    let has_liked = likes::has_liked(&state, user.id, artwork_id)?;
    Ok(Json(ApiResponse::ok(LikeStatusResponse { has_liked })))
}
