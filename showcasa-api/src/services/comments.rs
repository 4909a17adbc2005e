use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::event::UserSummary;

use crate::events::publisher;
use crate::models::{ArtworkCounter, Comment};
use crate::services::notifications::{self, NotificationDraft};
use crate::services::user_summaries;
use crate::store::{transaction, SessionExt};
use crate::AppState;

pub const MAX_COMMENT_LEN: usize = 2000;

/// A comment with its author populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub artwork_id: Uuid,
    pub user: Option<UserSummary>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Add a comment and bump the artwork's comment count.
pub async fn add_comment(state: &AppState, actor: Uuid, artwork_id: Uuid, content: &str) -> AppResult<CommentView> {
    if content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::new(ErrorCode::ValidationError, "comment is too long"));
    }

    let (view, notification) = transaction(state.store(), |tx| {
        let artwork = tx.artwork(artwork_id)?;
        let author = tx.user(actor)?;

        let comment = Comment::new(artwork_id, actor, content);
        tx.insert_comment(&comment)?;
        tx.increment_artwork_counter(artwork_id, ArtworkCounter::Comments, 1)?;

        let notification = if artwork.artist_id != actor {
            Some(notifications::create(
                tx,
                NotificationDraft::comment(artwork.artist_id, actor, artwork_id, content),
            )?)
        } else {
            None
        };

        let view = CommentView {
            id: comment.id,
            artwork_id,
            user: Some(author.summary()),
            content: comment.content,
            created_at: comment.created_at,
        };
        Ok((view, notification))
    })?;

    if let Some(record) = notification {
        publisher::publish_new_notification(state.broker(), &record).await;
    }
    tracing::info!(comment_id = %view.id, artwork_id = %artwork_id, "comment added");
    Ok(view)
}

/// Delete a comment. Only its author may delete it.
pub fn delete_comment(state: &AppState, actor: Uuid, comment_id: Uuid) -> AppResult<()> {
    transaction(state.store(), |tx| {
        let comment = tx
            .find_comment(comment_id)?
            .ok_or_else(|| AppError::new(ErrorCode::CommentNotFound, "comment not found"))?;

        if comment.user_id != actor {
            return Err(AppError::forbidden("only the author can delete this comment"));
        }

        if !tx.delete_comment(comment_id)? {
            return Err(AppError::new(ErrorCode::CommentNotFound, "comment not found"));
        }
        tx.increment_artwork_counter(comment.artwork_id, ArtworkCounter::Comments, -1)?;
        Ok(())
    })?;

    tracing::info!(comment_id = %comment_id, "comment deleted");
    Ok(())
}

/// Comments on an artwork, newest first.
pub fn list_comments(state: &AppState, artwork_id: Uuid) -> AppResult<Vec<CommentView>> {
    transaction(state.store(), |tx| {
        tx.artwork(artwork_id)?;
        let comments = tx.list_comments(artwork_id)?;
        let author_ids: Vec<Uuid> = comments.iter().map(|c| c.user_id).collect();
        let authors = user_summaries(tx, &author_ids)?;

        Ok(comments
            .into_iter()
            .map(|c| CommentView {
                id: c.id,
                artwork_id: c.artwork_id,
                user: authors.get(&c.user_id).cloned(),
                content: c.content,
                created_at: c.created_at,
            })
            .collect())
    })
}
