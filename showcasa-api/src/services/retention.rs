use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use showcasa_shared::errors::AppResult;

use crate::services::notifications;
use crate::store::RecordStore;
use crate::AppState;

/// Delete notifications read more than `retention` ago. Returns how many
/// were removed.
pub fn sweep(store: &dyn RecordStore, retention: Duration) -> AppResult<usize> {
    let retention = chrono::Duration::from_std(retention)
        .map_err(|e| anyhow::anyhow!("retention window out of range: {e}"))?;
    notifications::purge_read_before(store, Utc::now() - retention)
}

/// Spawn the periodic sweep of expired read notifications.
pub fn spawn_retention_task(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    let retention = Duration::from_secs(state.config.notification_retention_secs);
    let every = Duration::from_secs(state.config.retention_sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            match sweep(state.store(), retention) {
                Ok(0) => {}
                Ok(purged) => {
                    metrics::counter!("notifications_purged_total").increment(purged as u64);
                    tracing::info!(purged, "expired read notifications removed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "notification retention sweep failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifications::{add_notification, get_notifications, mark_as_read, NotificationDraft};
    use crate::test_support::Harness;

    #[tokio::test]
    async fn test_sweep_removes_only_expired_read_notifications() {
        let h = Harness::new();
        let user = h.user("ines");
        let read = add_notification(&h.state, NotificationDraft::system(user.id, "old"))
            .await
            .unwrap();
        add_notification(&h.state, NotificationDraft::system(user.id, "unread"))
            .await
            .unwrap();
        mark_as_read(&h.state, user.id, read.id).unwrap();

        // Inside the window nothing goes.
        assert_eq!(sweep(h.state.store(), Duration::from_secs(86_400)).unwrap(), 0);

        // A zero window expires everything already read.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sweep(h.state.store(), Duration::ZERO).unwrap(), 1);

        let remaining = get_notifications(&h.state, user.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].comment_text.as_deref(), Some("unread"));
    }
}
