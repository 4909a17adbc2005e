use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use showcasa_shared::types::event::{socket_events, MessageRecord, NewMessageEvent, NotificationRecord};

use crate::error::{ClientError, Result};
use crate::protocol::{self, Packet, DEFAULT_NAMESPACE};
use crate::subscription::{Callback, ListenerId, Subscriptions};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gateway base URL, `http(s)://` or `ws(s)://`.
    pub base_url: String,
    pub user_id: Uuid,
    /// Sent as the `token` query parameter when the gateway runs in token mode.
    pub token: Option<String>,
}

/// Handshake URL: `/socket.io/?EIO=4&transport=websocket&userId=<id>[&token=<jwt>]`.
pub fn socket_url(config: &SessionConfig) -> Result<Url> {
    let mut url = Url::parse(&config.base_url)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::UnsupportedScheme(scheme.to_string()))?;
    url.set_path("/socket.io/");
    url.set_query(None);

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket")
            .append_pair("userId", &config.user_id.to_string());
        if let Some(token) = &config.token {
            query.append_pair("token", token);
        }
    }

    Ok(url)
}

/// A live connection. Cloning shares the same underlying socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outgoing: mpsc::UnboundedSender<Packet>,
}

impl ConnectionHandle {
    pub fn is_open(&self) -> bool {
        !self.outgoing.is_closed()
    }

    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        self.outgoing.same_channel(&other.outgoing)
    }

    pub fn emit(&self, event: &str, args: Vec<serde_json::Value>) -> Result<()> {
        self.outgoing
            .send(Packet::event(event, args))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    pub fn close(&self) {
        let _ = self.outgoing.send(Packet::Close);
    }
}

/// One realtime connection per signed-in session.
pub struct ClientSession {
    user_id: Uuid,
    url: Url,
    subscriptions: Arc<Mutex<Subscriptions>>,
    connection: tokio::sync::Mutex<Option<ConnectionHandle>>,
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        Ok(Self {
            user_id: config.user_id,
            url: socket_url(&config)?,
            subscriptions: Arc::new(Mutex::new(Subscriptions::new())),
            connection: tokio::sync::Mutex::new(None),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the realtime connection, or return the one already open.
    pub async fn open(&self) -> Result<ConnectionHandle> {
        let mut slot = self.connection.lock().await;
        if let Some(handle) = slot.as_ref().filter(|h| h.is_open()) {
            return Ok(handle.clone());
        }

        tracing::info!(user_id = %self.user_id, "opening realtime connection");
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;

        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(ws, rx, self.subscriptions.clone()));

        let handle = ConnectionHandle { outgoing };
        *slot = Some(handle.clone());
        Ok(handle)
    }

    pub async fn close(&self) {
        if let Some(handle) = self.connection.lock().await.take() {
            handle.close();
        }
    }

    /// True once the namespace connect has been acknowledged.
    pub fn is_connected(&self) -> bool {
        lock(&self.subscriptions).is_connected()
    }

    /// Notifications addressed to this session's user.
    pub fn on_new_notification<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(NotificationRecord) + Send + Sync + 'static,
    {
        let user_id = self.user_id;
        self.register(socket_events::NEW_NOTIFICATION, move |value| {
            match serde_json::from_value::<NotificationRecord>(value.clone()) {
                Ok(notification) if notification.recipient_id == user_id => callback(notification),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring malformed notification event"),
            }
        })
    }

    /// Messages whose `receiverId` is this session's user.
    pub fn on_new_message<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(NewMessageEvent<MessageRecord>) + Send + Sync + 'static,
    {
        let user_id = self.user_id;
        self.register(socket_events::NEW_MESSAGE, move |value| {
            match serde_json::from_value::<NewMessageEvent<MessageRecord>>(value.clone()) {
                Ok(event) if Uuid::parse_str(&event.receiver_id).ok() == Some(user_id) => callback(event),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring malformed message event"),
            }
        })
    }

    pub fn unsubscribe_notifications(&self) -> usize {
        lock(&self.subscriptions).remove_event(socket_events::NEW_NOTIFICATION)
    }

    pub fn unsubscribe_messages(&self) -> usize {
        lock(&self.subscriptions).remove_event(socket_events::NEW_MESSAGE)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.subscriptions).remove(id)
    }

    fn register<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        lock(&self.subscriptions).register(event, callback)
    }
}

fn lock(subscriptions: &Mutex<Subscriptions>) -> MutexGuard<'_, Subscriptions> {
    subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply one incoming frame. Returns the packet to answer with, if any.
fn handle_frame(text: &str, subscriptions: &Mutex<Subscriptions>) -> Result<Option<Packet>> {
    match protocol::decode(text)? {
        Packet::Open(handshake) => {
            tracing::debug!(sid = %handshake.sid, "engine open; connecting namespace");
            Ok(Some(Packet::connect()))
        }
        Packet::Ping(data) => Ok(Some(Packet::Pong(data))),
        Packet::Pong(_) | Packet::Noop => Ok(None),
        Packet::Close => Err(ClientError::ConnectionClosed),
        Packet::Connect { .. } => {
            lock(subscriptions).mark_connected();
            tracing::info!("realtime namespace connected");
            Ok(None)
        }
        Packet::Disconnect { .. } => {
            lock(subscriptions).mark_disconnected();
            Err(ClientError::ConnectionClosed)
        }
        Packet::ConnectError { data, .. } => Err(ClientError::ConnectRejected(data.to_string())),
        Packet::Event { name, args, .. } => {
            let callbacks = lock(subscriptions).callbacks(&name);
            let payload = args.into_iter().next().unwrap_or(serde_json::Value::Null);
            for callback in callbacks {
                callback(&payload);
            }
            Ok(None)
        }
    }
}

async fn send_packet<S>(write: &mut S, packet: &Packet) -> Result<()>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    write.send(Message::Text(protocol::encode(packet)?)).await?;
    Ok(())
}

async fn drive(ws: WsStream, mut outgoing: mpsc::UnboundedReceiver<Packet>, subscriptions: Arc<Mutex<Subscriptions>>) {
    let (mut write, mut read) = ws.split();

    let result: Result<()> = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match handle_frame(&text, &subscriptions) {
                    Ok(Some(reply)) => {
                        if let Err(e) = send_packet(&mut write, &reply).await {
                            break Err(e);
                        }
                    }
                    Ok(None) => {}
                    Err(ClientError::ConnectionClosed) => break Ok(()),
                    Err(e @ ClientError::ConnectRejected(_)) => break Err(e),
                    Err(e) => tracing::warn!(error = %e, "skipping undecodable frame"),
                },
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
            packet = outgoing.recv() => match packet {
                Some(Packet::Close) | None => {
                    let disconnect = Packet::Disconnect { namespace: DEFAULT_NAMESPACE.into() };
                    let _ = send_packet(&mut write, &disconnect).await;
                    let _ = write.close().await;
                    break Ok(());
                }
                Some(packet) => {
                    if let Err(e) = send_packet(&mut write, &packet).await {
                        break Err(e);
                    }
                }
            },
        }
    };

    lock(&subscriptions).mark_disconnected();
    match result {
        Ok(()) => tracing::info!("realtime connection closed"),
        Err(e) => tracing::warn!(error = %e, "realtime connection lost"),
    }
}
