use serde::Serialize;

use showcasa_shared::clients::broker::EventPublisher;
use showcasa_shared::types::event::{
    channels, MessageRecord, NewMessageEvent, NewNotificationEvent, NotificationRecord,
};

/// Publish a message to one receiver's delivery group.
pub async fn publish_new_message(broker: &dyn EventPublisher, record: &MessageRecord, receiver_id: uuid::Uuid) {
    let event = NewMessageEvent {
        new_message: record,
        receiver_id: receiver_id.to_string(),
    };
    publish(broker, channels::NEW_MESSAGE, &event).await;
}

/// Publish a notification to its recipient's delivery group.
pub async fn publish_new_notification(broker: &dyn EventPublisher, record: &NotificationRecord) {
    let event = NewNotificationEvent {
        recipient_id: record.recipient_id.to_string(),
        notification: record,
    };
    publish(broker, channels::NEW_NOTIFICATION, &event).await;
}

/// Failures are logged and counted, never returned: the write this event
/// describes is already committed.
async fn publish<T: Serialize>(broker: &dyn EventPublisher, channel: &'static str, event: &T) {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(channel, error = %e, "failed to serialize event");
            return;
        }
    };

    match broker.publish(channel, &payload).await {
        Ok(()) => {
            metrics::counter!("broker_events_published_total", "channel" => channel).increment(1);
        }
        Err(e) => {
            tracing::warn!(channel, error = %e, "failed to publish event");
            metrics::counter!("broker_publish_failures_total", "channel" => channel).increment(1);
        }
    }
}
