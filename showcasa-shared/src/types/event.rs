use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broker channel names. Mutation services publish on these, the realtime
/// gateway subscribes to them.
pub mod channels {
    pub const NEW_NOTIFICATION: &str = "newNotification";
    pub const NEW_MESSAGE: &str = "newMessage";

    pub const ALL: [&str; 2] = [NEW_NOTIFICATION, NEW_MESSAGE];
}

/// Socket event names emitted by the gateway to connected clients.
pub mod socket_events {
    pub const NEW_NOTIFICATION: &str = "newNotification";
    pub const NEW_MESSAGE: &str = "newMessage";
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Follow => "follow",
            NotificationType::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(NotificationType::Like),
            "comment" => Ok(NotificationType::Comment),
            "follow" => Ok(NotificationType::Follow),
            "system" => Ok(NotificationType::System),
            _ => Err(format!("unknown notification type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSummary {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
}

/// A message with its sender populated, as delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A notification with sender and artwork display fields populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender: Option<UserSummary>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub artwork: Option<ArtworkSummary>,
    pub comment_text: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payload of the `newNotification` channel.
///
/// Generic over the notification body so the gateway can relay it without
/// interpreting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotificationEvent<N = NotificationRecord> {
    pub recipient_id: String,
    pub notification: N,
}

/// Payload of the `newMessage` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent<M = MessageRecord> {
    pub new_message: M,
    pub receiver_id: String,
}
