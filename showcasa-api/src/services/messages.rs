use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::event::MessageRecord;
use showcasa_shared::types::pagination::{Paginated, PaginationParams};

use crate::events::publisher;
use crate::models::Message;
use crate::services::chats::require_participant;
use crate::services::user_summaries;
use crate::store::{transaction, SessionExt};
use crate::AppState;

pub const MAX_MESSAGE_LEN: usize = 5000;

/// Send a message.
///
/// One transaction creates the message, points the chat at it, zeroes the
/// sender's unread counter and increments every other participant's counter.
/// After commit the populated message is published once per receiver.
pub async fn add_message(state: &AppState, actor: Uuid, chat_id: Uuid, content: &str) -> AppResult<MessageRecord> {
    if content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "message cannot be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::new(ErrorCode::ValidationError, "message is too long"));
    }

    let (record, receivers) = transaction(state.store(), |tx| {
        let chat = tx.chat(chat_id)?;
        require_participant(&chat, actor)?;
        let sender = tx.user(actor)?;

        let message = Message::new(chat_id, actor, content);
        tx.insert_message(&message)?;
        tx.set_last_message(chat_id, message.id, message.created_at)?;
        tx.reset_unread(chat_id, actor)?;

        let receivers: Vec<Uuid> = chat
            .participants()
            .into_iter()
            .filter(|participant| *participant != actor)
            .collect();
        for receiver in &receivers {
            tx.ensure_unread(chat_id, *receiver)?;
            tx.increment_unread(chat_id, *receiver, 1)?;
        }

        Ok((message.into_record(sender.summary()), receivers))
    })?;

    for receiver in receivers {
        publisher::publish_new_message(state.broker(), &record, receiver).await;
    }

    tracing::info!(message_id = %record.id, chat_id = %chat_id, sender = %actor, "message sent");
    Ok(record)
}

/// Messages of a chat, newest first.
pub fn get_messages(
    state: &AppState,
    actor: Uuid,
    chat_id: Uuid,
    params: &PaginationParams,
) -> AppResult<Paginated<MessageRecord>> {
    transaction(state.store(), |tx| {
        let chat = tx.chat(chat_id)?;
        require_participant(&chat, actor)?;

        let total = tx.count_messages(chat_id)?;
        let messages = tx.list_messages(chat_id, params.offset(), params.limit())?;
        let sender_ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
        let senders = user_summaries(tx, &sender_ids)?;

        let mut items = Vec::with_capacity(messages.len());
        for message in messages {
            let sender = match senders.get(&message.sender_id) {
                Some(summary) => summary.clone(),
                None => tx.user(message.sender_id)?.summary(),
            };
            items.push(message.into_record(sender));
        }

        Ok(Paginated::new(items, total.max(0) as u64, params))
    })
}
