use std::collections::{HashSet, VecDeque};

use crate::ports::spotify::{PlaylistStore, PlaylistStoreFactory, TrackUri};
use crate::services::auth::AuthError;
use crate::services::session::Credential;
use crate::spotify_rs::client::ApiError;

pub const MIN_SYNC_LIMIT: u32 = 1;
pub const MAX_SYNC_LIMIT: u32 = 100;
pub const DEFAULT_SYNC_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Spotify is unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Playlist {playlist_id} could not be found or is not accessible")]
    InvalidPlaylist { playlist_id: String },
    #[error("Both a source and a target playlist must be selected")]
    EmptySourceOrTarget,
    #[error("Track count must be between 1 and 100, got {0}")]
    InvalidLimit(i64),
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
}

impl SyncError {
    fn from_api(error: ApiError, playlist_id: &str) -> Self {
        match error {
            ApiError::NotFound(_) | ApiError::Forbidden(_) => SyncError::InvalidPlaylist {
                playlist_id: playlist_id.to_string(),
            },
            ApiError::Unauthorized(_) => SyncError::Unauthorized(AuthError::NeedsInteractiveAuth),
            other => SyncError::RemoteUnavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncResult {
    /// Number of tracks appended to the target
    pub added: usize,
    /// Number of eviction calls made against the target
    pub removed: usize,
}

impl SyncResult {
    /// Message shown to the user after a successful sync
    pub fn message(&self) -> String {
        if self.added == 0 {
            "No new tracks to sync.".to_string()
        } else {
            format!("{} new tracks added to target playlist.", self.added)
        }
    }
}

/// Offset of the trailing window of `limit` tracks in a playlist of `total` tracks.
pub fn trailing_offset(total: u32, limit: u32) -> u32 {
    total.saturating_sub(limit)
}

/// Source tracks, in source order, that appear nowhere in the target.
pub fn new_uris(source_window: &[TrackUri], target_window: &[TrackUri]) -> Vec<TrackUri> {
    let present: HashSet<&TrackUri> = target_window.iter().collect();
    source_window
        .iter()
        .filter(|uri| !present.contains(uri))
        .cloned()
        .collect()
}

/// Keeps the trailing window of a target playlist in step with a source playlist.
pub struct PlaylistSyncService<S: PlaylistStore> {
    store: S,
}

impl<S: PlaylistStore> PlaylistSyncService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn source_window(&self, source_id: &str, limit: u32) -> Result<Vec<TrackUri>, SyncError> {
        let total = self
            .store
            .get_playlist_track_count(source_id)
            .await
            .map_err(|e| SyncError::from_api(e, source_id))?;

        self.store
            .get_playlist_tracks(source_id, trailing_offset(total, limit), Some(limit))
            .await
            .map_err(|e| SyncError::from_api(e, source_id))
    }

    async fn target_window(&self, target_id: &str) -> Result<Vec<TrackUri>, SyncError> {
        self.store
            .get_playlist_tracks(target_id, 0, None)
            .await
            .map_err(|e| SyncError::from_api(e, target_id))
    }

    /// Append the newest `limit` source tracks that the target lacks, evicting
    /// the oldest target tracks first so the target stays within `limit`.
    ///
    /// Nothing is rolled back on failure: evictions that already happened stay.
    #[tracing::instrument(skip(self))]
    pub async fn sync_playlists(
        &self,
        source_id: &str,
        target_id: &str,
        limit: u32,
    ) -> Result<SyncResult, SyncError> {
        if source_id.trim().is_empty() || target_id.trim().is_empty() {
            return Err(SyncError::EmptySourceOrTarget);
        }
        if !(MIN_SYNC_LIMIT..=MAX_SYNC_LIMIT).contains(&limit) {
            return Err(SyncError::InvalidLimit(limit.into()));
        }

        let (source_window, target_window) = tokio::try_join!(
            self.source_window(source_id, limit),
            self.target_window(target_id)
        )?;
        tracing::debug!(
            source_tracks = source_window.len(),
            target_tracks = target_window.len(),
            "Fetched playlist windows"
        );

        let new_uris = new_uris(&source_window, &target_window);
        let mut target_window = VecDeque::from(target_window);
        let limit = limit as usize;
        let mut removed = 0;

        while target_window.len() + new_uris.len() > limit {
            let Some(oldest) = target_window.pop_front() else {
                break;
            };

            self.store
                .remove_all_occurrences(target_id, &oldest)
                .await
                .map_err(|e| SyncError::from_api(e, target_id))?;
            removed += 1;
            tracing::debug!(uri = %oldest, "Evicted track from target playlist");
        }

        if !new_uris.is_empty() {
            self.store
                .append_tracks(target_id, &new_uris)
                .await
                .map_err(|e| SyncError::from_api(e, target_id))?;
        }

        let result = SyncResult {
            added: new_uris.len(),
            removed,
        };
        tracing::info!(
            added = result.added,
            removed = result.removed,
            "Playlist sync complete"
        );

        Ok(result)
    }
}

/// Run a sync on behalf of the holder of `credential`.
pub async fn sync_playlists(
    stores: &dyn PlaylistStoreFactory,
    credential: &Credential,
    source_id: &str,
    target_id: &str,
    limit: u32,
) -> Result<SyncResult, SyncError> {
    if credential.is_expired() {
        return Err(SyncError::Unauthorized(AuthError::NeedsInteractiveAuth));
    }

    PlaylistSyncService::new(stores.connect(&credential.access_token))
        .sync_playlists(source_id, target_id, limit)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};
    use reqwest::StatusCode;

    use super::*;
    use crate::ports::spotify::{MockPlaylistStore, MockPlaylistStoreFactory};

    fn uris(values: &[&str]) -> Vec<TrackUri> {
        values.iter().map(|value| TrackUri::from(*value)).collect()
    }

    /// Records mutations so tests can compare against the remote playlist afterwards.
    #[derive(Default)]
    struct Remote {
        target: Vec<TrackUri>,
        removed: Vec<TrackUri>,
        appended: Vec<Vec<TrackUri>>,
    }

    /// A mock whose target playlist behaves like the real one: removals drop
    /// every occurrence and appends go to the end.
    fn mock_store(source: Vec<TrackUri>, remote: Arc<Mutex<Remote>>) -> MockPlaylistStore {
        let mut store = MockPlaylistStore::new();

        let total = source.len() as u32;
        store
            .expect_get_playlist_track_count()
            .withf(|id| id == "source")
            .returning(move |_| Ok(total));

        let target_remote = remote.clone();
        store
            .expect_get_playlist_tracks()
            .returning(move |id, offset, limit| {
                if id == "source" {
                    let items = source.iter().skip(offset as usize);
                    Ok(match limit {
                        Some(limit) => items.take(limit as usize).cloned().collect(),
                        None => items.cloned().collect(),
                    })
                } else {
                    Ok(target_remote.lock().unwrap().target.clone())
                }
            });

        let remove_remote = remote.clone();
        store
            .expect_remove_all_occurrences()
            .withf(|id, _| id == "target")
            .returning(move |_, uri| {
                let mut remote = remove_remote.lock().unwrap();
                remote.target.retain(|existing| existing != uri);
                remote.removed.push(uri.clone());
                Ok(())
            });

        store
            .expect_append_tracks()
            .withf(|id, _| id == "target")
            .returning(move |_, uris| {
                let mut remote = remote.lock().unwrap();
                remote.target.extend(uris.iter().cloned());
                remote.appended.push(uris.to_vec());
                Ok(())
            });

        store
    }

    fn remote_with_target(target: &[&str]) -> Arc<Mutex<Remote>> {
        Arc::new(Mutex::new(Remote {
            target: uris(target),
            ..Default::default()
        }))
    }

    #[test]
    fn test_trailing_offset() {
        assert_eq!(trailing_offset(10, 3), 7);
        assert_eq!(trailing_offset(2, 3), 0);
        assert_eq!(trailing_offset(0, 100), 0);
    }

    #[test]
    fn test_new_uris_preserves_source_order() {
        let source = uris(&["d", "a", "c", "b"]);
        let target = uris(&["c", "x"]);

        assert_eq!(new_uris(&source, &target), uris(&["d", "a", "b"]));
    }

    #[test]
    fn test_new_uris_checks_whole_target() {
        // "a" sits at the very front of a long target and is still not re-added
        let source = uris(&["a", "z"]);
        let target = uris(&["a", "b", "c", "d", "e", "f"]);

        assert_eq!(new_uris(&source, &target), uris(&["z"]));
    }

    #[test]
    fn test_sync_result_message() {
        assert_eq!(
            SyncResult {
                added: 0,
                removed: 0
            }
            .message(),
            "No new tracks to sync."
        );
        assert_eq!(
            SyncResult {
                added: 3,
                removed: 1
            }
            .message(),
            "3 new tracks added to target playlist."
        );
    }

    #[tokio::test]
    async fn test_sync_replaces_disjoint_target() {
        let remote = remote_with_target(&["x", "y"]);
        let store = mock_store(uris(&["a", "b", "c"]), remote.clone());
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 3).await.unwrap();

        assert_eq!(result, SyncResult { added: 3, removed: 2 });
        let remote = remote.lock().unwrap();
        assert_eq!(remote.removed, uris(&["x", "y"]));
        assert_eq!(remote.appended, vec![uris(&["a", "b", "c"])]);
        assert_eq!(remote.target, uris(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_sync_skips_tracks_already_in_target() {
        let remote = remote_with_target(&["b", "c", "d"]);
        let store = mock_store(uris(&["a", "b"]), remote.clone());
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 3).await.unwrap();

        assert_eq!(result, SyncResult { added: 1, removed: 1 });
        let remote = remote.lock().unwrap();
        assert_eq!(remote.removed, uris(&["b"]));
        assert_eq!(remote.target, uris(&["c", "d", "a"]));
    }

    #[tokio::test]
    async fn test_sync_evicts_oldest_target_track_first() {
        // eviction order follows the target, not the source
        let remote = remote_with_target(&["c", "b", "d"]);
        let store = mock_store(uris(&["a", "b"]), remote.clone());
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 3).await.unwrap();

        assert_eq!(result.added, 1);
        let remote = remote.lock().unwrap();
        assert_eq!(remote.removed, uris(&["c"]));
        assert_eq!(remote.target, uris(&["b", "d", "a"]));
    }

    #[tokio::test]
    async fn test_sync_empty_source_changes_nothing() {
        let mut store = MockPlaylistStore::new();
        store
            .expect_get_playlist_track_count()
            .returning(|_| Ok(0));
        store.expect_get_playlist_tracks().returning(|id, _, _| {
            if id == "source" {
                Ok(Vec::new())
            } else {
                Ok(uris(&["p", "q"]))
            }
        });
        store.expect_remove_all_occurrences().never();
        store.expect_append_tracks().never();
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 5).await.unwrap();

        assert_eq!(result, SyncResult { added: 0, removed: 0 });
    }

    #[tokio::test]
    async fn test_sync_fetches_trailing_window_of_source() {
        let source: Vec<String> = (0..10).map(|i| format!("s{}", i)).collect();
        let source: Vec<TrackUri> = source.into_iter().map(TrackUri::from).collect();
        let remote = remote_with_target(&[]);
        let store = mock_store(source, remote.clone());
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 4).await.unwrap();

        assert_eq!(result.added, 4);
        assert_eq!(remote.lock().unwrap().target, uris(&["s6", "s7", "s8", "s9"]));
    }

    #[tokio::test]
    async fn test_sync_twice_is_idempotent() {
        let remote = remote_with_target(&["x", "y", "z"]);
        let source = uris(&["a", "b", "c", "d"]);

        let first = PlaylistSyncService::new(mock_store(source.clone(), remote.clone()))
            .sync_playlists("source", "target", 3)
            .await
            .unwrap();
        let second = PlaylistSyncService::new(mock_store(source, remote.clone()))
            .sync_playlists("source", "target", 3)
            .await
            .unwrap();

        assert_eq!(first.added, 3);
        assert_eq!(second, SyncResult { added: 0, removed: 0 });
        assert_eq!(remote.lock().unwrap().target, uris(&["b", "c", "d"]));
    }

    #[tokio::test]
    async fn test_sync_respects_bound() {
        let remote = remote_with_target(&["t1", "t2", "t3", "t4", "t5"]);
        let store = mock_store(uris(&["n1", "n2", "t5"]), remote.clone());
        let service = PlaylistSyncService::new(store);

        service.sync_playlists("source", "target", 4).await.unwrap();

        let remote = remote.lock().unwrap();
        assert!(remote.target.len() <= 4);
        assert_eq!(remote.target, uris(&["t4", "t5", "n1", "n2"]));
    }

    #[tokio::test]
    async fn test_sync_duplicate_eviction_can_undershoot() {
        // Evicting "a" removes both copies remotely while only one slot is
        // released in the tracked window.
        let remote = remote_with_target(&["a", "b", "a"]);
        let store = mock_store(uris(&["n"]), remote.clone());
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 3).await.unwrap();

        assert_eq!(result, SyncResult { added: 1, removed: 1 });
        assert_eq!(remote.lock().unwrap().target, uris(&["b", "n"]));
    }

    #[tokio::test]
    async fn test_invalid_limit_rejected_before_remote_calls() {
        let service = PlaylistSyncService::new(MockPlaylistStore::new());

        assert_eq!(
            service.sync_playlists("source", "target", 0).await,
            Err(SyncError::InvalidLimit(0))
        );
        assert_eq!(
            service.sync_playlists("source", "target", 101).await,
            Err(SyncError::InvalidLimit(101))
        );
    }

    #[tokio::test]
    async fn test_empty_identifiers_rejected() {
        let service = PlaylistSyncService::new(MockPlaylistStore::new());

        assert_eq!(
            service.sync_playlists("", "target", 10).await,
            Err(SyncError::EmptySourceOrTarget)
        );
        assert_eq!(
            service.sync_playlists("source", " ", 10).await,
            Err(SyncError::EmptySourceOrTarget)
        );
    }

    #[tokio::test]
    async fn test_missing_playlist_is_invalid() {
        let mut store = MockPlaylistStore::new();
        store
            .expect_get_playlist_track_count()
            .returning(|_| Err(ApiError::NotFound("gone".into())));
        store
            .expect_get_playlist_tracks()
            .returning(|_, _, _| Ok(Vec::new()));
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("deleted", "target", 10).await;

        assert_eq!(
            result,
            Err(SyncError::InvalidPlaylist {
                playlist_id: "deleted".into()
            })
        );
    }

    #[tokio::test]
    async fn test_failed_append_keeps_evictions() {
        let remote = remote_with_target(&["x", "y"]);
        let mut store = MockPlaylistStore::new();

        let fetch_remote = remote.clone();
        store
            .expect_get_playlist_track_count()
            .returning(|_| Ok(2));
        store
            .expect_get_playlist_tracks()
            .returning(move |id, _, _| {
                if id == "source" {
                    Ok(uris(&["a", "b"]))
                } else {
                    Ok(fetch_remote.lock().unwrap().target.clone())
                }
            });
        let remove_remote = remote.clone();
        store
            .expect_remove_all_occurrences()
            .times(2)
            .returning(move |_, uri| {
                remove_remote
                    .lock()
                    .unwrap()
                    .target
                    .retain(|existing| existing != uri);
                Ok(())
            });
        store.expect_append_tracks().times(1).returning(|_, _| {
            Err(ApiError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream".into(),
            })
        });
        let service = PlaylistSyncService::new(store);

        let result = service.sync_playlists("source", "target", 2).await;

        assert!(matches!(result, Err(SyncError::RemoteUnavailable(_))));
        assert!(remote.lock().unwrap().target.is_empty());
    }

    #[tokio::test]
    async fn test_expired_credential_rejected() {
        let credential = Credential {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: Utc::now() - Duration::minutes(1),
        };

        let mut stores = MockPlaylistStoreFactory::new();
        stores.expect_connect().never();

        let result = sync_playlists(&stores, &credential, "source", "target", 10).await;

        assert_eq!(
            result,
            Err(SyncError::Unauthorized(AuthError::NeedsInteractiveAuth))
        );
    }
}
