use uuid::Uuid;

use showcasa_shared::types::event::{MessageRecord, NotificationRecord};

/// Messages of the chat currently on screen, oldest first.
#[derive(Debug, Clone)]
pub struct ChatView {
    pub chat_id: Uuid,
    pub messages: Vec<MessageRecord>,
}

impl ChatView {
    pub fn new(chat_id: Uuid, history: Vec<MessageRecord>) -> Self {
        Self { chat_id, messages: history }
    }

    /// Append a realtime message. Returns false when it belongs to another
    /// chat or is already shown.
    pub fn apply(&mut self, message: &MessageRecord) -> bool {
        if message.chat_id != self.chat_id || self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message.clone());
        true
    }
}

/// Notification list, newest first.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    pub items: Vec<NotificationRecord>,
}

impl NotificationFeed {
    pub fn new(items: Vec<NotificationRecord>) -> Self {
        Self { items }
    }

    pub fn apply(&mut self, notification: &NotificationRecord) -> bool {
        if self.items.iter().any(|n| n.id == notification.id) {
            return false;
        }
        self.items.insert(0, notification.clone());
        true
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.is_read).count()
    }
}
