use chrono::{DateTime, Utc};
use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Artwork, ArtworkCounter, Chat, Comment, Follow, Like, Message, Notification, UnreadCount,
    User, UserCounter,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Classify a diesel error: missing rows and unique violations are
    /// expected outcomes, everything else is a database failure.
    pub fn from_diesel(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        Self::from_diesel(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::not_found("record not found"),
            StoreError::Conflict(detail) => {
                tracing::debug!(detail = %detail, "store constraint violation");
                AppError::conflict("record already exists")
            }
            other => {
                tracing::error!(error = %other, "store failure");
                AppError::new(ErrorCode::InternalError, "internal server error")
            }
        }
    }
}

/// Transactional record store. Mutation services open a [`Session`], do their
/// existence checks, writes and counter deltas through it, and commit before
/// touching the broker. Sessions are synchronous so none can be held across
/// an `.await`.
pub trait RecordStore: Send + Sync {
    /// Open a transaction.
    fn begin(&self) -> StoreResult<Box<dyn Session + '_>>;

    /// Store kind for logs and health output.
    fn kind(&self) -> &'static str;
}

/// One open store transaction. Dropping a session without committing rolls
/// it back.
pub trait Session {
    // users and artworks (owned elsewhere; only counters are written here)
    fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    fn find_users(&mut self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    fn find_artwork(&mut self, id: Uuid) -> StoreResult<Option<Artwork>>;
    /// Atomic `counter = counter + delta`. NotFound when the user is missing.
    fn increment_user_counter(&mut self, id: Uuid, counter: UserCounter, delta: i32) -> StoreResult<()>;
    fn increment_artwork_counter(&mut self, id: Uuid, counter: ArtworkCounter, delta: i32) -> StoreResult<()>;

    // likes
    fn find_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<Option<Like>>;
    fn insert_like(&mut self, like: &Like) -> StoreResult<()>;
    fn delete_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<bool>;

    // follows
    fn find_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>>;
    fn insert_follow(&mut self, follow: &Follow) -> StoreResult<()>;
    fn delete_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool>;
    fn follower_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
    fn following_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    // comments
    fn insert_comment(&mut self, comment: &Comment) -> StoreResult<()>;
    fn find_comment(&mut self, id: Uuid) -> StoreResult<Option<Comment>>;
    fn delete_comment(&mut self, id: Uuid) -> StoreResult<bool>;
    /// Newest first.
    fn list_comments(&mut self, artwork_id: Uuid) -> StoreResult<Vec<Comment>>;

    // chats
    fn find_chat(&mut self, id: Uuid) -> StoreResult<Option<Chat>>;
    fn find_chat_between(&mut self, user: Uuid, other: Uuid) -> StoreResult<Option<Chat>>;
    fn insert_chat(&mut self, chat: &Chat) -> StoreResult<()>;
    /// Most recently updated first.
    fn list_chats(&mut self, user_id: Uuid) -> StoreResult<Vec<Chat>>;
    fn set_last_message(&mut self, chat_id: Uuid, message_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    // unread counters, one row per (chat, user)
    /// Create the counter at 0 if absent; an existing counter is untouched.
    fn ensure_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    fn increment_unread(&mut self, chat_id: Uuid, user_id: Uuid, delta: i32) -> StoreResult<()>;
    /// Direct set to 0, creating the row if needed.
    fn reset_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    fn unread_counts(&mut self, chat_id: Uuid) -> StoreResult<Vec<UnreadCount>>;
    fn total_unread(&mut self, user_id: Uuid) -> StoreResult<i64>;

    // messages
    fn insert_message(&mut self, message: &Message) -> StoreResult<()>;
    fn find_message(&mut self, id: Uuid) -> StoreResult<Option<Message>>;
    /// Newest first.
    fn list_messages(&mut self, chat_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Message>>;
    fn count_messages(&mut self, chat_id: Uuid) -> StoreResult<i64>;

    // notifications
    fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()>;
    fn find_notification(&mut self, id: Uuid) -> StoreResult<Option<Notification>>;
    /// Marks an unread notification read at `at`. Returns false when it was
    /// already read, leaving its `read_at` untouched.
    fn mark_notification_read(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;
    /// Newest first.
    fn list_notifications(&mut self, recipient_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>>;
    fn count_unread_notifications(&mut self, recipient_id: Uuid) -> StoreResult<i64>;
    /// Delete read notifications whose `read_at` is before `before`.
    fn purge_read_notifications(&mut self, before: DateTime<Utc>) -> StoreResult<usize>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
    fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// Run `f` inside one store transaction.
///
/// Commits when `f` succeeds, aborts when it fails. Nothing is retried.
pub fn transaction<T, F>(store: &dyn RecordStore, f: F) -> AppResult<T>
where
    F: FnOnce(&mut dyn Session) -> AppResult<T>,
{
    let mut session = store.begin()?;
    match f(session.as_mut()) {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_err) = session.abort() {
                tracing::warn!(error = %abort_err, "transaction abort failed");
            }
            Err(e)
        }
    }
}

/// Lookup helpers that turn a missing record into the matching error code.
pub trait SessionExt {
    fn user(&mut self, id: Uuid) -> AppResult<User>;
    fn artwork(&mut self, id: Uuid) -> AppResult<Artwork>;
    fn chat(&mut self, id: Uuid) -> AppResult<Chat>;
}

impl SessionExt for dyn Session + '_ {
    fn user(&mut self, id: Uuid) -> AppResult<User> {
        self.find_user(id)?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
    }

    fn artwork(&mut self, id: Uuid) -> AppResult<Artwork> {
        self.find_artwork(id)?
            .ok_or_else(|| AppError::new(ErrorCode::ArtworkNotFound, "artwork not found"))
    }

    fn chat(&mut self, id: Uuid) -> AppResult<Chat> {
        self.find_chat(id)?
            .ok_or_else(|| AppError::new(ErrorCode::ChatNotFound, "chat not found"))
    }
}
