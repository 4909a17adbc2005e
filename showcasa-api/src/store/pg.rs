use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use showcasa_shared::clients::db::DbPool;

use super::{RecordStore, Session, StoreError, StoreResult};
use crate::models::{
    ordered_pair, Artwork, ArtworkCounter, Chat, Comment, Follow, Like, Message, Notification,
    UnreadCount, User, UserCounter,
};
use crate::schema::{
    artworks, chat_unread_counts, chats, comments, follows, likes, messages, notifications, users,
};

/// PostgreSQL record store. Each session is one pooled connection with an open
/// transaction.
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl RecordStore for PgStore {
    fn begin(&self) -> StoreResult<Box<dyn Session + '_>> {
        let mut conn = self.pool.get()?;
        AnsiTransactionManager::begin_transaction(&mut *conn)?;
        Ok(Box::new(PgSession { conn, open: true }))
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

struct PgSession {
    conn: PooledConnection<ConnectionManager<PgConnection>>,
    open: bool,
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *self.conn) {
                tracing::warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

/// Rows updated must be non-zero, otherwise the target row does not exist.
fn expect_row(updated: usize) -> StoreResult<()> {
    if updated == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

impl Session for PgSession {
    fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(users::table.find(id).first::<User>(self.conn()).optional()?)
    }

    fn find_users(&mut self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = users::table
            .filter(users::id.eq_any(ids.to_vec()))
            .load::<User>(self.conn())?;

        // Keep the caller's order.
        let mut by_id: HashMap<Uuid, User> = rows.into_iter().map(|u| (u.id, u)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn find_artwork(&mut self, id: Uuid) -> StoreResult<Option<Artwork>> {
        Ok(artworks::table.find(id).first::<Artwork>(self.conn()).optional()?)
    }

    fn increment_user_counter(&mut self, id: Uuid, counter: UserCounter, delta: i32) -> StoreResult<()> {
        let conn = self.conn();
        let updated = match counter {
            UserCounter::Followers => diesel::update(users::table.find(id))
                .set(users::follower_count.eq(users::follower_count + delta))
                .execute(conn)?,
            UserCounter::Following => diesel::update(users::table.find(id))
                .set(users::following_count.eq(users::following_count + delta))
                .execute(conn)?,
            UserCounter::TotalLikes => diesel::update(users::table.find(id))
                .set(users::total_likes.eq(users::total_likes + delta))
                .execute(conn)?,
        };
        expect_row(updated)
    }

    fn increment_artwork_counter(&mut self, id: Uuid, counter: ArtworkCounter, delta: i32) -> StoreResult<()> {
        let conn = self.conn();
        let updated = match counter {
            ArtworkCounter::Likes => diesel::update(artworks::table.find(id))
                .set(artworks::like_count.eq(artworks::like_count + delta))
                .execute(conn)?,
            ArtworkCounter::Comments => diesel::update(artworks::table.find(id))
                .set(artworks::comment_count.eq(artworks::comment_count + delta))
                .execute(conn)?,
        };
        expect_row(updated)
    }

    fn find_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<Option<Like>> {
        Ok(likes::table
            .filter(likes::user_id.eq(user_id))
            .filter(likes::artwork_id.eq(artwork_id))
            .first::<Like>(self.conn())
            .optional()?)
    }

    fn insert_like(&mut self, like: &Like) -> StoreResult<()> {
        diesel::insert_into(likes::table)
            .values(like)
            .execute(self.conn())?;
        Ok(())
    }

    fn delete_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<bool> {
        let deleted = diesel::delete(
            likes::table
                .filter(likes::user_id.eq(user_id))
                .filter(likes::artwork_id.eq(artwork_id)),
        )
        .execute(self.conn())?;
        Ok(deleted > 0)
    }

    fn find_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>> {
        Ok(follows::table
            .filter(follows::follower_id.eq(follower_id))
            .filter(follows::following_id.eq(following_id))
            .first::<Follow>(self.conn())
            .optional()?)
    }

    fn insert_follow(&mut self, follow: &Follow) -> StoreResult<()> {
        diesel::insert_into(follows::table)
            .values(follow)
            .execute(self.conn())?;
        Ok(())
    }

    fn delete_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let deleted = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::following_id.eq(following_id)),
        )
        .execute(self.conn())?;
        Ok(deleted > 0)
    }

    fn follower_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(follows::table
            .filter(follows::following_id.eq(user_id))
            .order((follows::created_at.desc(), follows::id.desc()))
            .select(follows::follower_id)
            .load::<Uuid>(self.conn())?)
    }

    fn following_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(follows::table
            .filter(follows::follower_id.eq(user_id))
            .order((follows::created_at.desc(), follows::id.desc()))
            .select(follows::following_id)
            .load::<Uuid>(self.conn())?)
    }

    fn insert_comment(&mut self, comment: &Comment) -> StoreResult<()> {
        diesel::insert_into(comments::table)
            .values(comment)
            .execute(self.conn())?;
        Ok(())
    }

    fn find_comment(&mut self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(comments::table.find(id).first::<Comment>(self.conn()).optional()?)
    }

    fn delete_comment(&mut self, id: Uuid) -> StoreResult<bool> {
        let deleted = diesel::delete(comments::table.find(id)).execute(self.conn())?;
        Ok(deleted > 0)
    }

    fn list_comments(&mut self, artwork_id: Uuid) -> StoreResult<Vec<Comment>> {
        Ok(comments::table
            .filter(comments::artwork_id.eq(artwork_id))
            .order((comments::created_at.desc(), comments::id.desc()))
            .load::<Comment>(self.conn())?)
    }

    fn find_chat(&mut self, id: Uuid) -> StoreResult<Option<Chat>> {
        Ok(chats::table.find(id).first::<Chat>(self.conn()).optional()?)
    }

    fn find_chat_between(&mut self, user: Uuid, other: Uuid) -> StoreResult<Option<Chat>> {
        let (a, b) = ordered_pair(user, other);
        Ok(chats::table
            .filter(chats::participant_a.eq(a))
            .filter(chats::participant_b.eq(b))
            .first::<Chat>(self.conn())
            .optional()?)
    }

    fn insert_chat(&mut self, chat: &Chat) -> StoreResult<()> {
        diesel::insert_into(chats::table)
            .values(chat)
            .execute(self.conn())?;
        Ok(())
    }

    fn list_chats(&mut self, user_id: Uuid) -> StoreResult<Vec<Chat>> {
        Ok(chats::table
            .filter(
                chats::participant_a
                    .eq(user_id)
                    .or(chats::participant_b.eq(user_id)),
            )
            .order((chats::updated_at.desc(), chats::id.desc()))
            .load::<Chat>(self.conn())?)
    }

    fn set_last_message(&mut self, chat_id: Uuid, message_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let updated = diesel::update(chats::table.find(chat_id))
            .set((
                chats::last_message_id.eq(Some(message_id)),
                chats::updated_at.eq(at),
            ))
            .execute(self.conn())?;
        expect_row(updated)
    }

    fn ensure_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        diesel::insert_into(chat_unread_counts::table)
            .values(&UnreadCount { chat_id, user_id, count: 0 })
            .on_conflict((chat_unread_counts::chat_id, chat_unread_counts::user_id))
            .do_nothing()
            .execute(self.conn())?;
        Ok(())
    }

    fn increment_unread(&mut self, chat_id: Uuid, user_id: Uuid, delta: i32) -> StoreResult<()> {
        let updated = diesel::update(
            chat_unread_counts::table
                .filter(chat_unread_counts::chat_id.eq(chat_id))
                .filter(chat_unread_counts::user_id.eq(user_id)),
        )
        .set(chat_unread_counts::count.eq(chat_unread_counts::count + delta))
        .execute(self.conn())?;
        expect_row(updated)
    }

    fn reset_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        diesel::insert_into(chat_unread_counts::table)
            .values(&UnreadCount { chat_id, user_id, count: 0 })
            .on_conflict((chat_unread_counts::chat_id, chat_unread_counts::user_id))
            .do_update()
            .set(chat_unread_counts::count.eq(0))
            .execute(self.conn())?;
        Ok(())
    }

    fn unread_counts(&mut self, chat_id: Uuid) -> StoreResult<Vec<UnreadCount>> {
        Ok(chat_unread_counts::table
            .filter(chat_unread_counts::chat_id.eq(chat_id))
            .order(chat_unread_counts::user_id.asc())
            .load::<UnreadCount>(self.conn())?)
    }

    fn total_unread(&mut self, user_id: Uuid) -> StoreResult<i64> {
        let total: Option<i64> = chat_unread_counts::table
            .filter(chat_unread_counts::user_id.eq(user_id))
            .select(diesel::dsl::sum(chat_unread_counts::count))
            .first(self.conn())?;
        Ok(total.unwrap_or(0))
    }

    fn insert_message(&mut self, message: &Message) -> StoreResult<()> {
        diesel::insert_into(messages::table)
            .values(message)
            .execute(self.conn())?;
        Ok(())
    }

    fn find_message(&mut self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(messages::table.find(id).first::<Message>(self.conn()).optional()?)
    }

    fn list_messages(&mut self, chat_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Message>> {
        Ok(messages::table
            .filter(messages::chat_id.eq(chat_id))
            .order((messages::created_at.desc(), messages::id.desc()))
            .offset(offset)
            .limit(limit)
            .load::<Message>(self.conn())?)
    }

    fn count_messages(&mut self, chat_id: Uuid) -> StoreResult<i64> {
        Ok(messages::table
            .filter(messages::chat_id.eq(chat_id))
            .count()
            .get_result::<i64>(self.conn())?)
    }

    fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        diesel::insert_into(notifications::table)
            .values(notification)
            .execute(self.conn())?;
        Ok(())
    }

    fn find_notification(&mut self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(notifications::table
            .find(id)
            .first::<Notification>(self.conn())
            .optional()?)
    }

    fn mark_notification_read(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let updated = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::is_read.eq(false)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::read_at.eq(Some(at)),
        ))
        .execute(self.conn())?;

        if updated > 0 {
            return Ok(true);
        }
        match self.find_notification(id)? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound),
        }
    }

    fn list_notifications(&mut self, recipient_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>> {
        Ok(notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(limit)
            .load::<Notification>(self.conn())?)
    }

    fn count_unread_notifications(&mut self, recipient_id: Uuid) -> StoreResult<i64> {
        Ok(notifications::table
            .filter(notifications::recipient_id.eq(recipient_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result::<i64>(self.conn())?)
    }

    fn purge_read_notifications(&mut self, before: DateTime<Utc>) -> StoreResult<usize> {
        Ok(diesel::delete(
            notifications::table
                .filter(notifications::is_read.eq(true))
                .filter(notifications::read_at.lt(before)),
        )
        .execute(self.conn())?)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        self.open = false;
        Ok(())
    }

    fn abort(mut self: Box<Self>) -> StoreResult<()> {
        self.open = false;
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }
}
