use std::collections::HashMap;

use uuid::Uuid;

use showcasa_shared::errors::{AppResult, ErrorCode};
use showcasa_shared::types::api::Outcome;
use showcasa_shared::types::event::UserSummary;

use crate::store::Session;

pub mod chats;
pub mod comments;
pub mod follows;
pub mod likes;
pub mod messages;
pub mod notifications;
pub mod retention;

/// Display summaries for `ids`, keyed by id. Unknown ids are left out.
pub(crate) fn user_summaries(tx: &mut dyn Session, ids: &[Uuid]) -> AppResult<HashMap<Uuid, UserSummary>> {
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();
    Ok(tx
        .find_users(&unique)?
        .into_iter()
        .map(|u| (u.id, u.summary()))
        .collect())
}

/// A unique-constraint conflict on an idempotent create means a concurrent
/// request created the same record first.
pub(crate) fn unchanged_on_conflict<T>(result: AppResult<Outcome<T>>) -> AppResult<Outcome<T>> {
    match result {
        Err(e) if e.error_code() == ErrorCode::Conflict => Ok(Outcome::Unchanged),
        other => other,
    }
}
