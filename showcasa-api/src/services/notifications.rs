use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::api::Outcome;
use showcasa_shared::types::event::{
    ArtworkSummary, NotificationRecord, NotificationType, UserSummary,
};

use crate::events::publisher;
use crate::models::Notification;
use crate::services::user_summaries;
use crate::store::{transaction, RecordStore, Session};
use crate::AppState;

/// How many notifications the feed returns.
pub const FEED_LIMIT: i64 = 20;

#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub kind: NotificationType,
    pub artwork_id: Option<Uuid>,
    pub comment_text: Option<String>,
}

impl NotificationDraft {
    pub fn like(recipient_id: Uuid, sender_id: Uuid, artwork_id: Uuid) -> Self {
        Self {
            recipient_id,
            sender_id: Some(sender_id),
            kind: NotificationType::Like,
            artwork_id: Some(artwork_id),
            comment_text: None,
        }
    }

    pub fn comment(recipient_id: Uuid, sender_id: Uuid, artwork_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            recipient_id,
            sender_id: Some(sender_id),
            kind: NotificationType::Comment,
            artwork_id: Some(artwork_id),
            comment_text: Some(text.into()),
        }
    }

    pub fn follow(recipient_id: Uuid, sender_id: Uuid) -> Self {
        Self {
            recipient_id,
            sender_id: Some(sender_id),
            kind: NotificationType::Follow,
            artwork_id: None,
            comment_text: None,
        }
    }

    pub fn system(recipient_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            recipient_id,
            sender_id: None,
            kind: NotificationType::System,
            artwork_id: None,
            comment_text: Some(text.into()),
        }
    }
}

/// Insert a notification inside an open transaction and return it populated.
/// The caller publishes it once the transaction has committed.
pub fn create(tx: &mut dyn Session, draft: NotificationDraft) -> AppResult<NotificationRecord> {
    let notification = Notification::new(
        draft.recipient_id,
        draft.sender_id,
        draft.kind,
        draft.artwork_id,
        draft.comment_text,
    );
    tx.insert_notification(&notification)?;
    populate(tx, notification)
}

/// Attach sender and artwork display fields.
pub fn populate(tx: &mut dyn Session, notification: Notification) -> AppResult<NotificationRecord> {
    let sender = match notification.sender_id {
        Some(id) => tx.find_user(id)?.map(|u| u.summary()),
        None => None,
    };
    let artwork = match notification.artwork_id {
        Some(id) => tx.find_artwork(id)?.map(|a| a.summary()),
        None => None,
    };
    to_record(notification, sender, artwork)
}

fn to_record(
    notification: Notification,
    sender: Option<UserSummary>,
    artwork: Option<ArtworkSummary>,
) -> AppResult<NotificationRecord> {
    let kind = notification
        .notification_type
        .parse::<NotificationType>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    Ok(NotificationRecord {
        id: notification.id,
        recipient_id: notification.recipient_id,
        sender,
        notification_type: kind,
        artwork,
        comment_text: notification.comment_text,
        is_read: notification.is_read,
        read_at: notification.read_at,
        created_at: notification.created_at,
    })
}

/// Create a notification and push it to the recipient.
pub async fn add_notification(state: &AppState, draft: NotificationDraft) -> AppResult<NotificationRecord> {
    let record = transaction(state.store(), |tx| create(tx, draft))?;

    publisher::publish_new_notification(state.broker(), &record).await;
    tracing::debug!(notification_id = %record.id, recipient = %record.recipient_id, "notification added");
    Ok(record)
}

/// Latest notifications for `user_id`, newest first.
pub fn get_notifications(state: &AppState, user_id: Uuid) -> AppResult<Vec<NotificationRecord>> {
    transaction(state.store(), |tx| {
        let rows = tx.list_notifications(user_id, FEED_LIMIT)?;

        let sender_ids: Vec<Uuid> = rows.iter().filter_map(|n| n.sender_id).collect();
        let senders = user_summaries(tx, &sender_ids)?;

        let mut artworks: HashMap<Uuid, ArtworkSummary> = HashMap::new();
        for id in rows.iter().filter_map(|n| n.artwork_id) {
            if !artworks.contains_key(&id) {
                if let Some(artwork) = tx.find_artwork(id)? {
                    artworks.insert(id, artwork.summary());
                }
            }
        }

        rows.into_iter()
            .map(|n| {
                let sender = n.sender_id.and_then(|id| senders.get(&id).cloned());
                let artwork = n.artwork_id.and_then(|id| artworks.get(&id).cloned());
                to_record(n, sender, artwork)
            })
            .collect()
    })
}

pub fn get_unread_count(state: &AppState, user_id: Uuid) -> AppResult<i64> {
    transaction(state.store(), |tx| Ok(tx.count_unread_notifications(user_id)?))
}

/// Mark a notification read. Only its recipient may do so. Marking an
/// already-read notification is a no-op that keeps the original `read_at`.
pub fn mark_as_read(state: &AppState, actor: Uuid, notification_id: Uuid) -> AppResult<Outcome<NotificationRecord>> {
    transaction(state.store(), |tx| {
        let notification = tx
            .find_notification(notification_id)?
            .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;

        if notification.recipient_id != actor {
            return Err(AppError::forbidden("notification belongs to another user"));
        }

        if !tx.mark_notification_read(notification_id, Utc::now())? {
            return Ok(Outcome::Unchanged);
        }

        let updated = tx
            .find_notification(notification_id)?
            .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;
        Ok(Outcome::Applied(populate(tx, updated)?))
    })
}

/// Delete read notifications whose `read_at` is older than `cutoff`.
pub fn purge_read_before(store: &dyn RecordStore, cutoff: DateTime<Utc>) -> AppResult<usize> {
    transaction(store, |tx| Ok(tx.purge_read_notifications(cutoff)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use showcasa_shared::types::event::channels;

    #[tokio::test]
    async fn test_add_notification_publishes_populated_record() {
        let h = Harness::new();
        let artist = h.user("ines");
        let fan = h.user("bo");
        let artwork = h.artwork(&artist, "Dusk");

        let record = add_notification(&h.state, NotificationDraft::like(artist.id, fan.id, artwork.id))
            .await
            .unwrap();
        assert_eq!(record.sender.as_ref().unwrap().username, "bo");
        assert_eq!(record.artwork.as_ref().unwrap().title, "Dusk");

        let events = h.broker.published_on(channels::NEW_NOTIFICATION);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["recipientId"], artist.id.to_string());
        assert_eq!(events[0]["notification"]["type"], "like");
        assert_eq!(events[0]["notification"]["sender"]["username"], "bo");
    }

    #[tokio::test]
    async fn test_mark_as_read_is_monotonic() {
        let h = Harness::new();
        let user = h.user("ines");
        let record = add_notification(&h.state, NotificationDraft::system(user.id, "welcome"))
            .await
            .unwrap();
        assert_eq!(get_unread_count(&h.state, user.id).unwrap(), 1);

        let first = mark_as_read(&h.state, user.id, record.id).unwrap();
        let read_at = first.applied().unwrap().read_at.unwrap();
        assert_eq!(get_unread_count(&h.state, user.id).unwrap(), 0);

        let second = mark_as_read(&h.state, user.id, record.id).unwrap();
        assert_eq!(second, Outcome::Unchanged);

        let feed = get_notifications(&h.state, user.id).unwrap();
        assert!(feed[0].is_read);
        assert_eq!(feed[0].read_at, Some(read_at));
    }

    #[tokio::test]
    async fn test_only_recipient_can_mark_read() {
        let h = Harness::new();
        let owner = h.user("ines");
        let other = h.user("bo");
        let record = add_notification(&h.state, NotificationDraft::system(owner.id, "hi"))
            .await
            .unwrap();

        let err = mark_as_read(&h.state, other.id, record.id).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Forbidden);

        let err = mark_as_read(&h.state, owner.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotificationNotFound);
    }

    #[tokio::test]
    async fn test_feed_is_capped_and_newest_first() {
        let h = Harness::new();
        let user = h.user("ines");
        for i in 0..25 {
            add_notification(&h.state, NotificationDraft::system(user.id, format!("n{i}")))
                .await
                .unwrap();
        }

        let feed = get_notifications(&h.state, user.id).unwrap();
        assert_eq!(feed.len(), FEED_LIMIT as usize);
        assert_eq!(feed[0].comment_text.as_deref(), Some("n24"));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_notification() {
        let h = Harness::new();
        let user = h.user("ines");
        h.broker.set_failing(true);

        add_notification(&h.state, NotificationDraft::system(user.id, "hi"))
            .await
            .unwrap();
        assert_eq!(get_unread_count(&h.state, user.id).unwrap(), 1);
    }
}
