use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::event::{MessageRecord, UserSummary};

use crate::models::Chat;
use crate::services::user_summaries;
use crate::store::{transaction, Session, SessionExt};
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: Uuid,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<MessageRecord>,
    pub unread_counts: BTreeMap<Uuid, i32>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatExists {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
}

pub(crate) fn require_participant(chat: &Chat, user_id: Uuid) -> AppResult<()> {
    if !chat.has_participant(user_id) {
        return Err(AppError::new(
            ErrorCode::NotChatParticipant,
            "you are not a participant of this chat",
        ));
    }
    Ok(())
}

fn build_view(tx: &mut dyn Session, chat: Chat) -> AppResult<ChatView> {
    let participant_ids = chat.participants();
    let summaries = user_summaries(tx, &participant_ids)?;
    let participants = participant_ids
        .iter()
        .filter_map(|id| summaries.get(id).cloned())
        .collect();

    let last_message = match chat.last_message_id {
        Some(id) => match tx.find_message(id)? {
            Some(message) => {
                let sender = match summaries.get(&message.sender_id) {
                    Some(summary) => summary.clone(),
                    None => tx.user(message.sender_id)?.summary(),
                };
                Some(message.into_record(sender))
            }
            None => None,
        },
        None => None,
    };

    let unread_counts = tx
        .unread_counts(chat.id)?
        .into_iter()
        .map(|c| (c.user_id, c.count))
        .collect();

    Ok(ChatView {
        id: chat.id,
        participants,
        last_message,
        unread_counts,
        updated_at: chat.updated_at,
    })
}

fn open_chat(tx: &mut dyn Session, actor: Uuid, other: Uuid) -> AppResult<ChatView> {
    tx.user(other)?;

    if let Some(chat) = tx.find_chat_between(actor, other)? {
        return build_view(tx, chat);
    }

    let chat = Chat::between(actor, other);
    tx.insert_chat(&chat)?;
    for participant in chat.participants() {
        tx.ensure_unread(chat.id, participant)?;
    }
    tracing::info!(chat_id = %chat.id, "chat created");
    build_view(tx, chat)
}

/// Return the chat between `actor` and `other`, creating it on first contact.
pub fn find_or_create_chat(state: &AppState, actor: Uuid, other: Uuid) -> AppResult<ChatView> {
    if actor == other {
        return Err(AppError::new(ErrorCode::CannotChatWithSelf, "cannot start a chat with yourself"));
    }

    match transaction(state.store(), |tx| open_chat(tx, actor, other)) {
        // Lost a creation race; the other request's chat is now visible.
        Err(e) if e.error_code() == ErrorCode::Conflict => {
            transaction(state.store(), |tx| open_chat(tx, actor, other))
        }
        result => result,
    }
}

pub fn chat_exists(state: &AppState, actor: Uuid, other: Uuid) -> AppResult<ChatExists> {
    transaction(state.store(), |tx| {
        let chat = tx.find_chat_between(actor, other)?;
        Ok(ChatExists {
            exists: chat.is_some(),
            chat_id: chat.map(|c| c.id),
        })
    })
}

/// The user's chats, most recently active first.
pub fn get_chats(state: &AppState, user_id: Uuid) -> AppResult<Vec<ChatView>> {
    transaction(state.store(), |tx| {
        let chats = tx.list_chats(user_id)?;
        chats.into_iter().map(|chat| build_view(tx, chat)).collect()
    })
}

pub fn get_chat(state: &AppState, actor: Uuid, chat_id: Uuid) -> AppResult<ChatView> {
    transaction(state.store(), |tx| {
        let chat = tx.chat(chat_id)?;
        require_participant(&chat, actor)?;
        build_view(tx, chat)
    })
}

/// Set the actor's unread counter for the chat to zero.
pub fn mark_as_read(state: &AppState, actor: Uuid, chat_id: Uuid) -> AppResult<()> {
    transaction(state.store(), |tx| {
        let chat = tx.chat(chat_id)?;
        require_participant(&chat, actor)?;
        tx.reset_unread(chat_id, actor)?;
        Ok(())
    })
}

/// Sum of the user's unread counters across all chats.
pub fn get_total_unread_count(state: &AppState, user_id: Uuid) -> AppResult<i64> {
    transaction(state.store(), |tx| Ok(tx.total_unread(user_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;

    #[test]
    fn test_find_or_create_is_idempotent_across_initiators() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");

        let first = find_or_create_chat(&h.state, u1.id, u2.id).unwrap();
        let second = find_or_create_chat(&h.state, u2.id, u1.id).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.participants.len(), 2);
        assert_eq!(first.unread_counts.get(&u1.id), Some(&0));
        assert_eq!(first.unread_counts.get(&u2.id), Some(&0));

        let exists = chat_exists(&h.state, u2.id, u1.id).unwrap();
        assert_eq!(exists, ChatExists { exists: true, chat_id: Some(first.id) });
    }

    #[test]
    fn test_chat_with_self_is_rejected() {
        let h = Harness::new();
        let u1 = h.user("u1");

        let err = find_or_create_chat(&h.state, u1.id, u1.id).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::CannotChatWithSelf);
    }

    #[test]
    fn test_chat_with_unknown_user() {
        let h = Harness::new();
        let u1 = h.user("u1");

        let err = find_or_create_chat(&h.state, u1.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::UserNotFound);
        assert!(!chat_exists(&h.state, u1.id, Uuid::new_v4()).unwrap().exists);
    }

    #[test]
    fn test_outsider_cannot_read_chat() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");
        let outsider = h.user("u3");
        let chat = find_or_create_chat(&h.state, u1.id, u2.id).unwrap();

        let err = get_chat(&h.state, outsider.id, chat.id).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotChatParticipant);
        let err = mark_as_read(&h.state, outsider.id, chat.id).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotChatParticipant);
        let err = get_chat(&h.state, u1.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ChatNotFound);
    }
}
