use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{RecordStore, Session, StoreError, StoreResult};
use crate::models::{
    ordered_pair, Artwork, ArtworkCounter, Chat, Comment, Follow, Like, Message, Notification,
    UnreadCount, User, UserCounter,
};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: HashMap<Uuid, User>,
    artworks: HashMap<Uuid, Artwork>,
    likes: Vec<Like>,
    follows: Vec<Follow>,
    comments: Vec<Comment>,
    chats: HashMap<Uuid, Chat>,
    unread: HashMap<(Uuid, Uuid), i32>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
}

/// In-process record store.
///
/// Transactions are serialized: a session holds the table lock for its whole
/// lifetime and works on a copy that replaces the tables on commit.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_counter_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every counter update fail with `Unavailable` until switched back.
    pub fn fail_counter_updates(&self, fail: bool) {
        self.fail_counter_updates.store(fail, Ordering::SeqCst);
    }

    pub fn seed_user(&self, user: User) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.users.insert(user.id, user);
        }
    }

    pub fn seed_artwork(&self, artwork: Artwork) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.artworks.insert(artwork.id, artwork);
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl RecordStore for MemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn Session + '_>> {
        let guard = self.lock()?;
        let work = guard.clone();
        Ok(Box::new(MemorySession {
            guard,
            work,
            fail_counters: self.fail_counter_updates.load(Ordering::SeqCst),
        }))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession<'a> {
    guard: MutexGuard<'a, Tables>,
    work: Tables,
    fail_counters: bool,
}

impl MemorySession<'_> {
    fn check_counters(&self) -> StoreResult<()> {
        if self.fail_counters {
            return Err(StoreError::Unavailable("counter updates disabled".into()));
        }
        Ok(())
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl Session for MemorySession<'_> {
    fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    fn find_users(&mut self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        Ok(ids.iter().filter_map(|id| self.work.users.get(id).cloned()).collect())
    }

    fn find_artwork(&mut self, id: Uuid) -> StoreResult<Option<Artwork>> {
        Ok(self.work.artworks.get(&id).cloned())
    }

    fn increment_user_counter(&mut self, id: Uuid, counter: UserCounter, delta: i32) -> StoreResult<()> {
        self.check_counters()?;
        let user = self.work.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let field = match counter {
            UserCounter::Followers => &mut user.follower_count,
            UserCounter::Following => &mut user.following_count,
            UserCounter::TotalLikes => &mut user.total_likes,
        };
        *field += delta;
        Ok(())
    }

    fn increment_artwork_counter(&mut self, id: Uuid, counter: ArtworkCounter, delta: i32) -> StoreResult<()> {
        self.check_counters()?;
        let artwork = self.work.artworks.get_mut(&id).ok_or(StoreError::NotFound)?;
        let field = match counter {
            ArtworkCounter::Likes => &mut artwork.like_count,
            ArtworkCounter::Comments => &mut artwork.comment_count,
        };
        *field += delta;
        Ok(())
    }

    fn find_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<Option<Like>> {
        Ok(self
            .work
            .likes
            .iter()
            .find(|l| l.user_id == user_id && l.artwork_id == artwork_id)
            .cloned())
    }

    fn insert_like(&mut self, like: &Like) -> StoreResult<()> {
        if self.find_like(like.user_id, like.artwork_id)?.is_some() {
            return Err(StoreError::Conflict("likes_user_id_artwork_id_key".into()));
        }
        self.work.likes.push(like.clone());
        Ok(())
    }

    fn delete_like(&mut self, user_id: Uuid, artwork_id: Uuid) -> StoreResult<bool> {
        let before = self.work.likes.len();
        self.work
            .likes
            .retain(|l| !(l.user_id == user_id && l.artwork_id == artwork_id));
        Ok(self.work.likes.len() != before)
    }

    fn find_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<Option<Follow>> {
        Ok(self
            .work
            .follows
            .iter()
            .find(|f| f.follower_id == follower_id && f.following_id == following_id)
            .cloned())
    }

    fn insert_follow(&mut self, follow: &Follow) -> StoreResult<()> {
        if self.find_follow(follow.follower_id, follow.following_id)?.is_some() {
            return Err(StoreError::Conflict("follows_follower_id_following_id_key".into()));
        }
        self.work.follows.push(follow.clone());
        Ok(())
    }

    fn delete_follow(&mut self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let before = self.work.follows.len();
        self.work
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(self.work.follows.len() != before)
    }

    fn follower_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut follows: Vec<&Follow> = self
            .work
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .collect();
        newest_first(&mut follows, |f| (f.created_at, f.id));
        Ok(follows.into_iter().map(|f| f.follower_id).collect())
    }

    fn following_ids(&mut self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut follows: Vec<&Follow> = self
            .work
            .follows
            .iter()
            .filter(|f| f.follower_id == user_id)
            .collect();
        newest_first(&mut follows, |f| (f.created_at, f.id));
        Ok(follows.into_iter().map(|f| f.following_id).collect())
    }

    fn insert_comment(&mut self, comment: &Comment) -> StoreResult<()> {
        self.work.comments.push(comment.clone());
        Ok(())
    }

    fn find_comment(&mut self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.work.comments.iter().find(|c| c.id == id).cloned())
    }

    fn delete_comment(&mut self, id: Uuid) -> StoreResult<bool> {
        let before = self.work.comments.len();
        self.work.comments.retain(|c| c.id != id);
        Ok(self.work.comments.len() != before)
    }

    fn list_comments(&mut self, artwork_id: Uuid) -> StoreResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .work
            .comments
            .iter()
            .filter(|c| c.artwork_id == artwork_id)
            .cloned()
            .collect();
        newest_first(&mut comments, |c| (c.created_at, c.id));
        Ok(comments)
    }

    fn find_chat(&mut self, id: Uuid) -> StoreResult<Option<Chat>> {
        Ok(self.work.chats.get(&id).cloned())
    }

    fn find_chat_between(&mut self, user: Uuid, other: Uuid) -> StoreResult<Option<Chat>> {
        let (a, b) = ordered_pair(user, other);
        Ok(self
            .work
            .chats
            .values()
            .find(|c| c.participant_a == a && c.participant_b == b)
            .cloned())
    }

    fn insert_chat(&mut self, chat: &Chat) -> StoreResult<()> {
        if chat.participant_a >= chat.participant_b {
            return Err(StoreError::Unavailable("chats_participants_check".into()));
        }
        if self.find_chat_between(chat.participant_a, chat.participant_b)?.is_some() {
            return Err(StoreError::Conflict("chats_participant_a_participant_b_key".into()));
        }
        self.work.chats.insert(chat.id, chat.clone());
        Ok(())
    }

    fn list_chats(&mut self, user_id: Uuid) -> StoreResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .work
            .chats
            .values()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        newest_first(&mut chats, |c| (c.updated_at, c.id));
        Ok(chats)
    }

    fn set_last_message(&mut self, chat_id: Uuid, message_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let chat = self.work.chats.get_mut(&chat_id).ok_or(StoreError::NotFound)?;
        chat.last_message_id = Some(message_id);
        chat.updated_at = at;
        Ok(())
    }

    fn ensure_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.work.unread.entry((chat_id, user_id)).or_insert(0);
        Ok(())
    }

    fn increment_unread(&mut self, chat_id: Uuid, user_id: Uuid, delta: i32) -> StoreResult<()> {
        self.check_counters()?;
        let count = self
            .work
            .unread
            .get_mut(&(chat_id, user_id))
            .ok_or(StoreError::NotFound)?;
        *count += delta;
        Ok(())
    }

    fn reset_unread(&mut self, chat_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.work.unread.insert((chat_id, user_id), 0);
        Ok(())
    }

    fn unread_counts(&mut self, chat_id: Uuid) -> StoreResult<Vec<UnreadCount>> {
        let mut counts: Vec<UnreadCount> = self
            .work
            .unread
            .iter()
            .filter(|((chat, _), _)| *chat == chat_id)
            .map(|((chat, user), count)| UnreadCount {
                chat_id: *chat,
                user_id: *user,
                count: *count,
            })
            .collect();
        counts.sort_by_key(|c| c.user_id);
        Ok(counts)
    }

    fn total_unread(&mut self, user_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .work
            .unread
            .iter()
            .filter(|((_, user), _)| *user == user_id)
            .map(|(_, count)| i64::from(*count))
            .sum())
    }

    fn insert_message(&mut self, message: &Message) -> StoreResult<()> {
        if !self.work.chats.contains_key(&message.chat_id) {
            return Err(StoreError::Unavailable("messages_chat_id_fkey".into()));
        }
        self.work.messages.push(message.clone());
        Ok(())
    }

    fn find_message(&mut self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(self.work.messages.iter().find(|m| m.id == id).cloned())
    }

    fn list_messages(&mut self, chat_id: Uuid, offset: i64, limit: i64) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .work
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        newest_first(&mut messages, |m| (m.created_at, m.id));
        Ok(messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    fn count_messages(&mut self, chat_id: Uuid) -> StoreResult<i64> {
        Ok(self.work.messages.iter().filter(|m| m.chat_id == chat_id).count() as i64)
    }

    fn insert_notification(&mut self, notification: &Notification) -> StoreResult<()> {
        self.work.notifications.push(notification.clone());
        Ok(())
    }

    fn find_notification(&mut self, id: Uuid) -> StoreResult<Option<Notification>> {
        Ok(self.work.notifications.iter().find(|n| n.id == id).cloned())
    }

    fn mark_notification_read(&mut self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let notification = self
            .work
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(StoreError::NotFound)?;
        if notification.is_read {
            return Ok(false);
        }
        notification.is_read = true;
        notification.read_at = Some(at);
        Ok(true)
    }

    fn list_notifications(&mut self, recipient_id: Uuid, limit: i64) -> StoreResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .work
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        newest_first(&mut notifications, |n| (n.created_at, n.id));
        notifications.truncate(limit.max(0) as usize);
        Ok(notifications)
    }

    fn count_unread_notifications(&mut self, recipient_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .work
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as i64)
    }

    fn purge_read_notifications(&mut self, before: DateTime<Utc>) -> StoreResult<usize> {
        let before_len = self.work.notifications.len();
        self.work
            .notifications
            .retain(|n| !(n.is_read && n.read_at.map_or(false, |at| at < before)));
        Ok(before_len - self.work.notifications.len())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemorySession { mut guard, work, .. } = *self;
        *guard = work;
        Ok(())
    }

    fn abort(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_session_discards_writes() {
        let store = MemoryStore::new();
        let user = User::new("ada");
        store.seed_user(user.clone());

        {
            let mut session = store.begin().unwrap();
            session
                .increment_user_counter(user.id, UserCounter::TotalLikes, 5)
                .unwrap();
        }

        let mut session = store.begin().unwrap();
        assert_eq!(session.find_user(user.id).unwrap().unwrap().total_likes, 0);
    }

    #[test]
    fn test_ensure_unread_does_not_reset_existing_counter() {
        let store = MemoryStore::new();
        let chat_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let mut session = store.begin().unwrap();
        session.ensure_unread(chat_id, user_id).unwrap();
        session.increment_unread(chat_id, user_id, 3).unwrap();
        session.ensure_unread(chat_id, user_id).unwrap();
        assert_eq!(session.unread_counts(chat_id).unwrap()[0].count, 3);

        session.reset_unread(chat_id, user_id).unwrap();
        assert_eq!(session.total_unread(user_id).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_like_is_a_conflict() {
        let store = MemoryStore::new();
        let mut session = store.begin().unwrap();
        let like = Like::new(Uuid::new_v4(), Uuid::new_v4());

        session.insert_like(&like).unwrap();
        let err = session
            .insert_like(&Like::new(like.user_id, like.artwork_id))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_counter_fault_switch() {
        let store = MemoryStore::new();
        let user = User::new("ada");
        store.seed_user(user.clone());
        store.fail_counter_updates(true);

        let mut session = store.begin().unwrap();
        let err = session
            .increment_user_counter(user.id, UserCounter::Followers, 1)
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_purge_keeps_unread_and_recent() {
        let store = MemoryStore::new();
        let recipient = Uuid::new_v4();
        let now = Utc::now();

        let mut session = store.begin().unwrap();
        let old = Notification::new(recipient, None, showcasa_shared::NotificationType::System, None, None);
        let recent = Notification::new(recipient, None, showcasa_shared::NotificationType::System, None, None);
        let unread = Notification::new(recipient, None, showcasa_shared::NotificationType::System, None, None);
        for n in [&old, &recent, &unread] {
            session.insert_notification(n).unwrap();
        }
        session
            .mark_notification_read(old.id, now - chrono::Duration::hours(30))
            .unwrap();
        session.mark_notification_read(recent.id, now).unwrap();

        let purged = session
            .purge_read_notifications(now - chrono::Duration::hours(24))
            .unwrap();
        assert_eq!(purged, 1);
        assert!(session.find_notification(old.id).unwrap().is_none());
        assert!(session.find_notification(recent.id).unwrap().is_some());
        assert!(session.find_notification(unread.id).unwrap().is_some());
    }
}
