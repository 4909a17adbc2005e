use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use showcasa_shared::clients::broker::EventPublisher;
use showcasa_shared::clients::db::create_pool;
use showcasa_shared::clients::redis::RedisPublisher;
use showcasa_shared::middleware::{metrics_middleware, JwtSecret};

pub mod config;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::{AppConfig, StoreKind};
use store::{MemoryStore, PgStore, RecordStore};

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub broker: Arc<dyn EventPublisher>,
    pub config: AppConfig,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Wire the configured store and the Redis publisher. The broker is
    /// connected lazily, so a Redis outage does not prevent startup.
    pub fn from_config(config: AppConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let store: Arc<dyn RecordStore> = match config.store {
            StoreKind::Postgres => {
                let pool = create_pool(&config.database_url, config.db_pool_size)?;
                Arc::new(PgStore::new(pool))
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory record store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let broker = RedisPublisher::new(
            &config.redis_url,
            Duration::from_millis(config.broker_connect_timeout_ms),
            Duration::from_millis(config.broker_retry_cooldown_ms),
        )?;

        Ok(Self {
            store,
            broker: Arc::new(broker),
            config,
            metrics_handle,
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn broker(&self) -> &dyn EventPublisher {
        self.broker.as_ref()
    }
}

impl JwtSecret for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Likes
        .route(
            "/artworks/:id/like",
            post(routes::likes::like).delete(routes::likes::unlike).get(routes::likes::has_liked),
        )
        // Comments
        .route(
            "/artworks/:id/comments",
            get(routes::comments::list_comments).post(routes::comments::add_comment),
        )
        .route("/comments/:id", delete(routes::comments::delete_comment))
        // Follows
        .route(
            "/users/:id/follow",
            post(routes::follows::follow).delete(routes::follows::unfollow).get(routes::follows::is_following),
        )
        .route("/users/:id/followers", get(routes::follows::list_followers))
        .route("/users/:id/following", get(routes::follows::list_following))
        // Chats
        .route("/chats", get(routes::chats::get_chats).post(routes::chats::find_or_create_chat))
        .route("/chats/exists/:user_id", get(routes::chats::chat_exists))
        .route("/chats/:id", get(routes::chats::get_chat))
        .route("/chats/:id/read", post(routes::chats::mark_as_read))
        .route(
            "/chats/:id/messages",
            get(routes::messages::get_messages).post(routes::messages::add_message),
        )
        .route("/messages/unread-count", get(routes::messages::get_total_unread_count))
        // Notifications
        .route("/notifications", get(routes::notifications::get_notifications))
        .route("/notifications/unread-count", get(routes::notifications::get_unread_count))
        .route("/notifications/:id/read", post(routes::notifications::mark_as_read))
        .route_layer(axum::middleware::from_fn(metrics_middleware))
        // Ops
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
