use uuid::Uuid;

use showcasa_shared::errors::{AppError, AppResult, ErrorCode};
use showcasa_shared::types::api::Outcome;
use showcasa_shared::types::event::UserSummary;

use crate::events::publisher;
use crate::models::{Follow, UserCounter};
use crate::services::notifications::{self, NotificationDraft};
use crate::services::{unchanged_on_conflict, user_summaries};
use crate::store::{transaction, Session, SessionExt};
use crate::AppState;

/// The two counter updates of a follow edge, lower user id first. Crossing
/// follows between the same pair then lock their user rows in the same order.
fn counter_updates(follower: Uuid, following: Uuid) -> [(Uuid, UserCounter); 2] {
    let mut updates = [(follower, UserCounter::Following), (following, UserCounter::Followers)];
    updates.sort_by_key(|(id, _)| *id);
    updates
}

fn adjust_counters(tx: &mut dyn Session, follower: Uuid, following: Uuid, delta: i32) -> AppResult<()> {
    for (user_id, counter) in counter_updates(follower, following) {
        tx.increment_user_counter(user_id, counter, delta)?;
    }
    Ok(())
}

/// Follow `target`. Creates the follow row, bumps both users' counters and
/// records one `follow` notification, all in one transaction.
pub async fn follow(state: &AppState, actor: Uuid, target: Uuid) -> AppResult<Outcome<Follow>> {
    if actor == target {
        return Err(AppError::new(ErrorCode::CannotFollowSelf, "cannot follow yourself"));
    }

    let result = transaction(state.store(), |tx| {
        tx.user(target)?;

        if tx.find_follow(actor, target)?.is_some() {
            return Ok((Outcome::Unchanged, None));
        }

        let follow = Follow::new(actor, target);
        tx.insert_follow(&follow)?;
        adjust_counters(tx, actor, target, 1)?;
        let notification = notifications::create(tx, NotificationDraft::follow(target, actor))?;

        Ok((Outcome::Applied(follow), Some(notification)))
    });

    let (outcome, notification) = match result {
        Ok(done) => done,
        Err(e) => return unchanged_on_conflict(Err(e)),
    };

    if let Some(record) = notification {
        publisher::publish_new_notification(state.broker(), &record).await;
        tracing::info!(follower = %actor, following = %target, "user followed");
    }
    Ok(outcome)
}

/// Unfollow `target`. A no-op when not following.
pub fn unfollow(state: &AppState, actor: Uuid, target: Uuid) -> AppResult<Outcome<()>> {
    let outcome = transaction(state.store(), |tx| {
        if !tx.delete_follow(actor, target)? {
            return Ok(Outcome::Unchanged);
        }
        adjust_counters(tx, actor, target, -1)?;
        Ok(Outcome::Applied(()))
    })?;

    if outcome.is_applied() {
        tracing::info!(follower = %actor, following = %target, "user unfollowed");
    }
    Ok(outcome)
}

pub fn is_following(state: &AppState, actor: Uuid, target: Uuid) -> AppResult<bool> {
    transaction(state.store(), |tx| Ok(tx.find_follow(actor, target)?.is_some()))
}

/// Users following `user_id`, most recent first.
pub fn list_followers(state: &AppState, user_id: Uuid) -> AppResult<Vec<UserSummary>> {
    transaction(state.store(), |tx| {
        tx.user(user_id)?;
        let ids = tx.follower_ids(user_id)?;
        let summaries = user_summaries(tx, &ids)?;
        Ok(ids.iter().filter_map(|id| summaries.get(id).cloned()).collect())
    })
}

/// Users `user_id` follows, most recent first.
pub fn list_following(state: &AppState, user_id: Uuid) -> AppResult<Vec<UserSummary>> {
    transaction(state.store(), |tx| {
        tx.user(user_id)?;
        let ids = tx.following_ids(user_id)?;
        let summaries = user_summaries(tx, &ids)?;
        Ok(ids.iter().filter_map(|id| summaries.get(id).cloned()).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ordered_pair;
    use crate::test_support::Harness;
    use showcasa_shared::types::event::channels;

    #[tokio::test]
    async fn test_first_follow_then_duplicate() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");

        let first = follow(&h.state, u1.id, u2.id).await.unwrap();
        assert!(first.is_applied());
        assert_eq!(h.reload_user(&u2).follower_count, 1);
        assert_eq!(h.reload_user(&u1).following_count, 1);

        let feed = notifications::get_notifications(&h.state, u2.id).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].recipient_id, u2.id);
        assert_eq!(feed[0].sender.as_ref().unwrap().id, u1.id);
        assert_eq!(feed[0].notification_type, showcasa_shared::NotificationType::Follow);

        let second = follow(&h.state, u1.id, u2.id).await.unwrap();
        assert_eq!(second, Outcome::Unchanged);
        assert_eq!(h.reload_user(&u2).follower_count, 1);
        assert_eq!(h.reload_user(&u1).following_count, 1);
        assert_eq!(notifications::get_notifications(&h.state, u2.id).unwrap().len(), 1);
        assert_eq!(h.broker.published_on(channels::NEW_NOTIFICATION).len(), 1);
    }

    #[tokio::test]
    async fn test_follow_self_is_rejected() {
        let h = Harness::new();
        let u1 = h.user("u1");

        let err = follow(&h.state, u1.id, u1.id).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::CannotFollowSelf);
    }

    #[tokio::test]
    async fn test_follow_failure_creates_nothing() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");
        h.store.fail_counter_updates(true);

        assert!(follow(&h.state, u1.id, u2.id).await.is_err());

        h.store.fail_counter_updates(false);
        assert!(!is_following(&h.state, u1.id, u2.id).unwrap());
        assert!(notifications::get_notifications(&h.state, u2.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unfollow_and_lists() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");
        let u3 = h.user("u3");

        follow(&h.state, u1.id, u3.id).await.unwrap();
        follow(&h.state, u2.id, u3.id).await.unwrap();
        let followers: Vec<String> = list_followers(&h.state, u3.id)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(followers.len(), 2);
        assert!(followers.contains(&"u1".to_string()));

        assert!(unfollow(&h.state, u1.id, u3.id).unwrap().is_applied());
        assert_eq!(unfollow(&h.state, u1.id, u3.id).unwrap(), Outcome::Unchanged);
        assert_eq!(h.reload_user(&u3).follower_count, 1);
        assert_eq!(h.reload_user(&u1).following_count, 0);
        assert_eq!(list_following(&h.state, u2.id).unwrap()[0].id, u3.id);
    }

    #[test]
    fn test_counter_updates_do_not_depend_on_direction() {
        let (low, high) = ordered_pair(Uuid::new_v4(), Uuid::new_v4());

        let forward = counter_updates(low, high);
        let backward = counter_updates(high, low);
        assert_eq!(forward[0].0, low);
        assert_eq!(backward[0].0, low);
        assert_eq!(forward[0].1, UserCounter::Following);
        assert_eq!(backward[0].1, UserCounter::Followers);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_crossing_follows_both_apply() {
        let h = Harness::new();
        let u1 = h.user("u1");
        let u2 = h.user("u2");

        let (a, b) = (h.state.clone(), h.state.clone());
        let (id1, id2) = (u1.id, u2.id);
        let one = tokio::spawn(async move { follow(&a, id1, id2).await });
        let two = tokio::spawn(async move { follow(&b, id2, id1).await });
        assert!(one.await.unwrap().unwrap().is_applied());
        assert!(two.await.unwrap().unwrap().is_applied());

        for user in [&u1, &u2] {
            let user = h.reload_user(user);
            assert_eq!(user.follower_count, 1);
            assert_eq!(user.following_count, 1);
        }
    }
}
