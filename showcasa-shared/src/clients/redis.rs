use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_lite::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use super::broker::{BrokerError, EventPublisher};

/// Publisher over a lazily established Redis connection.
///
/// The connection is opened on first publish. Any failure drops it so a later
/// publish dials again, which lets the process start and keep serving while
/// Redis is down. Dialing happens outside the connection slot lock, and after
/// a failed dial publishes are skipped until `retry_cooldown` has passed.
pub struct RedisPublisher {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
    last_failure: Mutex<Option<Instant>>,
    connect_timeout: Duration,
    retry_cooldown: Duration,
    connected: AtomicBool,
}

impl RedisPublisher {
    pub fn new(url: &str, connect_timeout: Duration, retry_cooldown: Duration) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            last_failure: Mutex::new(None),
            connect_timeout,
            retry_cooldown,
            connected: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, BrokerError> {
        if let Some(conn) = self.conn.lock().await.as_ref() {
            return Ok(conn.clone());
        }

        if let Some(failed_at) = *self.last_failure.lock().await {
            if failed_at.elapsed() < self.retry_cooldown {
                return Err(BrokerError::Unavailable("reconnect cooling down".into()));
            }
        }

        let dialed = tokio::time::timeout(self.connect_timeout, self.client.get_connection_manager())
            .await
            .map_err(|_| BrokerError::ConnectTimeout(self.connect_timeout.as_millis() as u64))
            .and_then(|result| result.map_err(BrokerError::from));

        let conn = match dialed {
            Ok(conn) => conn,
            Err(e) => {
                *self.last_failure.lock().await = Some(Instant::now());
                return Err(e);
            }
        };

        self.last_failure.lock().await.take();
        let mut slot = self.conn.lock().await;
        // A concurrent dial may have won; keep the first connection.
        let conn = slot.get_or_insert(conn).clone();
        tracing::info!("connected to Redis publisher");
        Ok(conn)
    }

    async fn reset(&self) {
        self.conn.lock().await.take();
        self.connected.store(false, Ordering::Relaxed);
    }
}

#[async_trait]
impl EventPublisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        match conn.publish::<_, _, i64>(channel, payload).await {
            Ok(receivers) => {
                self.connected.store(true, Ordering::Relaxed);
                tracing::trace!(channel, receivers, "event published");
                Ok(())
            }
            Err(e) => {
                self.reset().await;
                Err(e.into())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: String,
}

/// Subscribing side of the broker.
pub struct RedisSubscriber {
    client: redis::Client,
}

impl RedisSubscriber {
    pub fn new(url: &str) -> Result<Self, BrokerError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }

    /// Open a subscription to `channels` and return the incoming message stream.
    ///
    /// The stream ends when the connection drops; callers resubscribe.
    pub async fn subscribe(
        &self,
        channels: &[&str],
    ) -> Result<impl Stream<Item = BrokerMessage>, BrokerError> {
        let mut pubsub = self.client.get_async_connection().await?.into_pubsub();
        for channel in channels {
            pubsub.subscribe(*channel).await?;
        }
        tracing::info!(?channels, "subscribed to broker channels");

        Ok(pubsub.into_on_message().filter_map(|msg| {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(BrokerMessage { channel, payload }),
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "dropping non-utf8 broker payload");
                    None
                }
            }
        }))
    }
}
