use std::time::Duration;

use futures_lite::StreamExt;
use serde_json::Value;
use socketioxide::SocketIo;
use uuid::Uuid;

use showcasa_shared::clients::redis::{BrokerMessage, RedisSubscriber};
use showcasa_shared::types::event::{channels, socket_events, NewMessageEvent, NewNotificationEvent};

use crate::errors::GatewayError;
use crate::socket::user_room;

/// A socket event bound for one user's delivery group.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub event: &'static str,
    pub payload: Value,
}

/// Work out who a broker message is for and what to emit to them.
///
/// `newNotification` re-emits only the notification body; `newMessage`
/// re-emits the whole envelope.
pub fn route(message: &BrokerMessage) -> Result<(Uuid, Outbound), GatewayError> {
    let malformed = |reason: String| GatewayError::MalformedPayload {
        channel: message.channel.clone(),
        reason,
    };

    match message.channel.as_str() {
        channels::NEW_NOTIFICATION => {
            let event: NewNotificationEvent<serde_json::Value> =
                serde_json::from_str(&message.payload).map_err(|e| malformed(e.to_string()))?;
            let recipient = parse_user_id(&event.recipient_id).map_err(malformed)?;
            Ok((
                recipient,
                Outbound { event: socket_events::NEW_NOTIFICATION, payload: event.notification },
            ))
        }
        channels::NEW_MESSAGE => {
            let payload: serde_json::Value =
                serde_json::from_str(&message.payload).map_err(|e| malformed(e.to_string()))?;
            let event: NewMessageEvent<serde_json::Value> =
                serde_json::from_value(payload.clone()).map_err(|e| malformed(e.to_string()))?;
            let receiver = parse_user_id(&event.receiver_id).map_err(malformed)?;
            Ok((receiver, Outbound { event: socket_events::NEW_MESSAGE, payload }))
        }
        other => Err(GatewayError::UnknownChannel(other.to_string())),
    }
}

fn parse_user_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw).map_err(|e| format!("target user id {raw:?}: {e}"))
}

/// Route one broker message and emit it to the target user's room. Returns
/// how many connections it was emitted to. Bad payloads are logged, counted
/// and skipped.
pub fn dispatch(io: &SocketIo, message: &BrokerMessage) -> usize {
    let (user_id, outbound) = match route(message) {
        Ok(routed) => routed,
        Err(e) => {
            tracing::warn!(channel = %message.channel, error = %e, "dropping broker payload");
            metrics::counter!("gateway_malformed_payloads_total", "channel" => message.channel.clone())
                .increment(1);
            return 0;
        }
    };

    let room = user_room(user_id);
    let event = outbound.event;
    let targets = io.to(room.clone()).sockets().map(|sockets| sockets.len()).unwrap_or(0);
    if targets == 0 {
        tracing::debug!(user_id = %user_id, event, "recipient offline; event dropped");
        metrics::counter!("gateway_offline_drops_total", "event" => event).increment(1);
        return 0;
    }

    if let Err(e) = io.to(room).emit(event, &outbound.payload) {
        tracing::warn!(user_id = %user_id, event, error = %e, "emit to delivery group failed");
        return 0;
    }

    metrics::counter!("gateway_events_relayed_total", "event" => event).increment(1);
    metrics::counter!("gateway_deliveries_total", "event" => event).increment(targets as u64);
    tracing::debug!(user_id = %user_id, event, delivered = targets, "relayed broker event");
    targets
}

/// Exponential backoff between resubscription attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self { initial, max, current: initial }
    }

    /// The delay to wait now; doubles the next one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Subscribe to every event channel and relay forever, resubscribing with
/// backoff whenever the subscription fails or ends.
pub async fn run_relay(subscriber: RedisSubscriber, io: SocketIo, mut backoff: Backoff) {
    loop {
        match subscriber.subscribe(&channels::ALL).await {
            Ok(stream) => {
                backoff.reset();
                let mut stream = std::pin::pin!(stream);

                while let Some(message) = stream.next().await {
                    dispatch(&io, &message);
                }
                tracing::warn!("broker subscription ended");
            }
            Err(e) => {
                tracing::warn!(error = %e, "broker subscribe failed");
            }
        }

        metrics::counter!("gateway_resubscribes_total").increment(1);
        let delay = backoff.next_delay();
        tracing::info!(delay_ms = delay.as_millis() as u64, "resubscribing to broker");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(channel: &str, payload: serde_json::Value) -> BrokerMessage {
        BrokerMessage { channel: channel.into(), payload: payload.to_string() }
    }

    #[test]
    fn test_notification_is_unwrapped_for_recipient() {
        let user = Uuid::new_v4();
        let msg = message(
            channels::NEW_NOTIFICATION,
            json!({ "recipientId": user.to_string(), "notification": { "type": "like" } }),
        );

        let (target, outbound) = route(&msg).unwrap();
        assert_eq!(target, user);
        assert_eq!(outbound.event, "newNotification");
        assert_eq!(outbound.payload, json!({ "type": "like" }));
    }

    #[test]
    fn test_message_envelope_is_relayed_whole() {
        let user = Uuid::new_v4();
        let payload = json!({ "newMessage": { "content": "hi" }, "receiverId": user.to_string() });

        let (target, outbound) = route(&message(channels::NEW_MESSAGE, payload.clone())).unwrap();
        assert_eq!(target, user);
        assert_eq!(outbound.event, "newMessage");
        assert_eq!(outbound.payload, payload);
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let not_json = BrokerMessage { channel: channels::NEW_MESSAGE.into(), payload: "{oops".into() };
        assert!(matches!(route(&not_json), Err(GatewayError::MalformedPayload { .. })));

        let bad_id = message(channels::NEW_NOTIFICATION, json!({ "recipientId": "u1", "notification": {} }));
        assert!(matches!(route(&bad_id), Err(GatewayError::MalformedPayload { .. })));

        let missing = message(channels::NEW_MESSAGE, json!({ "newMessage": {} }));
        assert!(matches!(route(&missing), Err(GatewayError::MalformedPayload { .. })));

        let unknown = message("somethingElse", json!({}));
        assert!(matches!(route(&unknown), Err(GatewayError::UnknownChannel(_))));
    }

    #[test]
    fn test_dispatch_skips_bad_payloads_and_offline_users() {
        let (_layer, io) = SocketIo::new_layer();
        io.ns("/", |_: socketioxide::extract::SocketRef| async {});

        let bad = BrokerMessage { channel: channels::NEW_NOTIFICATION.into(), payload: "nope".into() };
        assert_eq!(dispatch(&io, &bad), 0);

        let offline = message(
            channels::NEW_NOTIFICATION,
            json!({ "recipientId": Uuid::new_v4().to_string(), "notification": {} }),
        );
        assert_eq!(dispatch(&io, &offline), 0);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(1500));

        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
