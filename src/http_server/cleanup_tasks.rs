use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::services::session::SessionStore;

/// Sessions unused for this long are dropped, taking their credentials with them.
const MAX_SESSION_IDLE_HOURS: i64 = 24;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Removes sessions that have been idle for longer than the maximum idle time.
#[instrument(skip(sessions))]
pub async fn cleanup_sessions(sessions: &SessionStore) -> usize {
    let removed = sessions
        .remove_idle_longer_than(chrono::Duration::hours(MAX_SESSION_IDLE_HOURS))
        .await;
    if removed > 0 {
        tracing::info!(
            "Removed {} idle sessions, {} remain",
            removed,
            sessions.len().await
        );
    }
    removed
}

/// Periodically run [`cleanup_sessions`] until the process exits.
pub fn spawn_session_cleanup(sessions: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_sessions(&sessions).await;
        }
    })
}
