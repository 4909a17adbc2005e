use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use showcasa_shared::types::event::{
    ArtworkSummary, MessageRecord, NotificationType, UserSummary,
};

use crate::schema::{
    artworks, chat_unread_counts, chats, comments, follows, likes, messages, notifications, users,
};

// --- User ---

#[derive(Debug, Queryable, Identifiable, Insertable, Serialize, Clone, PartialEq)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub profile_picture_url: Option<String>,
    pub follower_count: i32,
    pub following_count: i32,
    pub total_likes: i32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: username.into(),
            profile_picture_url: None,
            follower_count: 0,
            following_count: 0,
            total_likes: 0,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCounter {
    Followers,
    Following,
    TotalLikes,
}

// --- Artwork ---

#[derive(Debug, Queryable, Identifiable, Insertable, Serialize, Clone, PartialEq)]
#[diesel(table_name = artworks)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub id: Uuid,
    pub artist_id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Artwork {
    pub fn new(artist_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            artist_id,
            title: title.into(),
            image_url: None,
            like_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> ArtworkSummary {
        ArtworkSummary {
            id: self.id,
            title: self.title.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkCounter {
    Likes,
    Comments,
}

// --- Like ---

#[derive(Debug, Queryable, Identifiable, Insertable, Serialize, Clone, PartialEq)]
#[diesel(table_name = likes)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub artwork_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn new(user_id: Uuid, artwork_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            artwork_id,
            created_at: Utc::now(),
        }
    }
}

// --- Follow ---

#[derive(Debug, Queryable, Identifiable, Insertable, Serialize, Clone, PartialEq)]
#[diesel(table_name = follows)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: Uuid, following_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            follower_id,
            following_id,
            created_at: Utc::now(),
        }
    }
}

// --- Comment ---

#[derive(Debug, Queryable, Identifiable, Insertable, Clone, PartialEq)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: Uuid,
    pub artwork_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(artwork_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            artwork_id,
            user_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

// --- Chat ---

/// A two-party chat. The pair is stored ordered (`participant_a < participant_b`)
/// so the unique constraint covers the unordered pair.
#[derive(Debug, Queryable, Identifiable, Insertable, Clone, PartialEq)]
#[diesel(table_name = chats)]
pub struct Chat {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub last_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn between(user: Uuid, other: Uuid) -> Self {
        let (participant_a, participant_b) = ordered_pair(user, other);
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            participant_a,
            participant_b,
            last_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn participants(&self) -> [Uuid; 2] {
        [self.participant_a, self.participant_b]
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }
}

pub fn ordered_pair(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
    if x <= y { (x, y) } else { (y, x) }
}

#[derive(Debug, Queryable, Insertable, Clone, PartialEq)]
#[diesel(table_name = chat_unread_counts)]
pub struct UnreadCount {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub count: i32,
}

// --- Message ---

#[derive(Debug, Queryable, Identifiable, Insertable, Clone, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(chat_id: Uuid, sender_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_id,
            sender_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn into_record(self, sender: UserSummary) -> MessageRecord {
        MessageRecord {
            id: self.id,
            chat_id: self.chat_id,
            sender,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

// --- Notification ---

#[derive(Debug, Queryable, Identifiable, Insertable, Clone, PartialEq)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub notification_type: String,
    pub artwork_id: Option<Uuid>,
    pub comment_text: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        sender_id: Option<Uuid>,
        kind: NotificationType,
        artwork_id: Option<Uuid>,
        comment_text: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            recipient_id,
            sender_id,
            notification_type: kind.as_str().to_string(),
            artwork_id,
            comment_text,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_pair_is_ordered_regardless_of_initiator() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();

        let one = Chat::between(x, y);
        let other = Chat::between(y, x);
        assert_eq!(
            (one.participant_a, one.participant_b),
            (other.participant_a, other.participant_b)
        );
        assert!(one.participant_a < one.participant_b);
        assert!(one.has_participant(x) && one.has_participant(y));
    }

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(Uuid::new_v4(), None, NotificationType::System, None, None);
        assert!(!n.is_read);
        assert!(n.read_at.is_none());
        assert_eq!(n.notification_type, "system");
    }
}
