use uuid::Uuid;

use showcasa_shared::errors::AppResult;
use showcasa_shared::types::api::Outcome;

use crate::events::publisher;
use crate::models::{ArtworkCounter, Like, UserCounter};
use crate::services::notifications::{self, NotificationDraft};
use crate::services::unchanged_on_conflict;
use crate::store::{transaction, SessionExt};
use crate::AppState;

/// Like an artwork. The like row, the artwork's like count and the artist's
/// total likes change together. Liking twice is a no-op.
pub async fn like(state: &AppState, actor: Uuid, artwork_id: Uuid) -> AppResult<Outcome<Like>> {
    let result = transaction(state.store(), |tx| {
        let artwork = tx.artwork(artwork_id)?;

        if tx.find_like(actor, artwork_id)?.is_some() {
            return Ok((Outcome::Unchanged, None));
        }

        let like = Like::new(actor, artwork_id);
        tx.insert_like(&like)?;
        tx.increment_artwork_counter(artwork_id, ArtworkCounter::Likes, 1)?;
        tx.increment_user_counter(artwork.artist_id, UserCounter::TotalLikes, 1)?;

        let notification = if artwork.artist_id != actor {
            Some(notifications::create(
                tx,
                NotificationDraft::like(artwork.artist_id, actor, artwork_id),
            )?)
        } else {
            None
        };

        Ok((Outcome::Applied(like), notification))
    });

    let (outcome, notification) = match result {
        Ok(done) => done,
        Err(e) => return unchanged_on_conflict(Err(e)),
    };

    if let Some(record) = notification {
        publisher::publish_new_notification(state.broker(), &record).await;
    }
    if outcome.is_applied() {
        tracing::info!(user_id = %actor, artwork_id = %artwork_id, "artwork liked");
    }
    Ok(outcome)
}

/// Remove a like. Unliking something not liked is a no-op.
pub fn unlike(state: &AppState, actor: Uuid, artwork_id: Uuid) -> AppResult<Outcome<()>> {
    let outcome = transaction(state.store(), |tx| {
        let artwork = tx.artwork(artwork_id)?;

        if !tx.delete_like(actor, artwork_id)? {
            return Ok(Outcome::Unchanged);
        }
        tx.increment_artwork_counter(artwork_id, ArtworkCounter::Likes, -1)?;
        tx.increment_user_counter(artwork.artist_id, UserCounter::TotalLikes, -1)?;
        Ok(Outcome::Applied(()))
    })?;

    if outcome.is_applied() {
        tracing::info!(user_id = %actor, artwork_id = %artwork_id, "artwork unliked");
    }
    Ok(outcome)
}

pub fn has_liked(state: &AppState, actor: Uuid, artwork_id: Uuid) -> AppResult<bool> {
    transaction(state.store(), |tx| Ok(tx.find_like(actor, artwork_id)?.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use showcasa_shared::errors::ErrorCode;
    use showcasa_shared::types::event::channels;

    #[tokio::test]
    async fn test_like_is_idempotent() {
        let h = Harness::new();
        let artist = h.user("ines");
        let fan = h.user("bo");
        let artwork = h.artwork(&artist, "Dusk");

        assert!(like(&h.state, fan.id, artwork.id).await.unwrap().is_applied());
        assert_eq!(like(&h.state, fan.id, artwork.id).await.unwrap(), Outcome::Unchanged);

        assert_eq!(h.reload_artwork(&artwork).like_count, 1);
        assert_eq!(h.reload_user(&artist).total_likes, 1);
        assert!(has_liked(&h.state, fan.id, artwork.id).unwrap());
        assert_eq!(h.broker.published_on(channels::NEW_NOTIFICATION).len(), 1);
    }

    #[tokio::test]
    async fn test_like_unlike_sequence_keeps_counters_paired() {
        let h = Harness::new();
        let artist = h.user("ines");
        let fans: Vec<_> = (0..3).map(|i| h.user(&format!("fan{i}"))).collect();
        let artwork = h.artwork(&artist, "Dusk");

        for fan in &fans {
            like(&h.state, fan.id, artwork.id).await.unwrap();
        }
        unlike(&h.state, fans[0].id, artwork.id).unwrap();
        assert_eq!(unlike(&h.state, fans[0].id, artwork.id).unwrap(), Outcome::Unchanged);
        like(&h.state, fans[1].id, artwork.id).await.unwrap();

        let artwork = h.reload_artwork(&artwork);
        let artist = h.reload_user(&artist);
        assert_eq!(artwork.like_count, 2);
        assert_eq!(artist.total_likes, 2);
        assert!(!has_liked(&h.state, fans[0].id, artwork.id).unwrap());
    }

    #[tokio::test]
    async fn test_counter_failure_leaves_no_like() {
        let h = Harness::new();
        let artist = h.user("ines");
        let fan = h.user("bo");
        let artwork = h.artwork(&artist, "Dusk");
        h.store.fail_counter_updates(true);

        let err = like(&h.state, fan.id, artwork.id).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::InternalError);

        h.store.fail_counter_updates(false);
        assert!(!has_liked(&h.state, fan.id, artwork.id).unwrap());
        assert_eq!(h.reload_artwork(&artwork).like_count, 0);
        assert!(h.broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_self_like_counts_without_notifying() {
        let h = Harness::new();
        let artist = h.user("ines");
        let artwork = h.artwork(&artist, "Dusk");

        like(&h.state, artist.id, artwork.id).await.unwrap();
        assert_eq!(h.reload_user(&artist).total_likes, 1);
        assert!(h.broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_like_missing_artwork() {
        let h = Harness::new();
        let fan = h.user("bo");

        let err = like(&h.state, fan.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ArtworkNotFound);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_like() {
        let h = Harness::new();
        let artist = h.user("ines");
        let fan = h.user("bo");
        let artwork = h.artwork(&artist, "Dusk");
        h.broker.set_failing(true);

        assert!(like(&h.state, fan.id, artwork.id).await.unwrap().is_applied());
        assert_eq!(h.reload_artwork(&artwork).like_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_likes_and_unlikes_keep_counters_exact() {
        let h = Harness::new();
        let artist = h.user("ines");
        let artwork = h.artwork(&artist, "Dusk");
        let fans: Vec<_> = (0..16).map(|i| h.user(&format!("fan{i}"))).collect();

        // Every fan likes twice at once; the first half also like-then-unlike,
        // racing their own likes.
        let mut tasks = Vec::new();
        for (i, fan) in fans.iter().enumerate() {
            for _ in 0..2 {
                let state = h.state.clone();
                let (fan_id, artwork_id) = (fan.id, artwork.id);
                tasks.push(tokio::spawn(async move {
                    like(&state, fan_id, artwork_id).await.map(|_| ())
                }));
            }
            if i < 8 {
                let state = h.state.clone();
                let (fan_id, artwork_id) = (fan.id, artwork.id);
                tasks.push(tokio::spawn(async move {
                    like(&state, fan_id, artwork_id)
                        .await
                        .and_then(|_| unlike(&state, fan_id, artwork_id).map(|_| ()))
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let live = fans
            .iter()
            .filter(|fan| has_liked(&h.state, fan.id, artwork.id).unwrap())
            .count() as i32;
        assert!((8..=16).contains(&live));
        assert_eq!(h.reload_artwork(&artwork).like_count, live);
        assert_eq!(h.reload_user(&artist).total_likes, live);
    }
}
