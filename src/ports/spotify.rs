use std::fmt;
use std::sync::Arc;

use crate::spotify_rs::auth::TokenRequestError;
use crate::spotify_rs::client::ApiError;

/// Opaque identifier of a track in the remote catalog. Two uris are the same
/// track only if the strings are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackUri(String);

impl TrackUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for TrackUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// Decoupled representation of a Spotify playlist from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub total_tracks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

/// Tokens handed out by the accounts service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_secs: u64,
}

/// Port trait wrapping the remote playlist store used by the sync engine.
///
/// Implementations live in `services::spotify::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn get_playlist_track_count(&self, playlist_id: &str) -> Result<u32, ApiError>;

    /// Tracks in list order starting at `offset`. `limit = None` means all remaining tracks.
    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<Vec<TrackUri>, ApiError>;

    async fn remove_all_occurrences(&self, playlist_id: &str, uri: &TrackUri)
    -> Result<(), ApiError>;

    async fn append_tracks(&self, playlist_id: &str, uris: &[TrackUri]) -> Result<(), ApiError>;

    async fn list_user_playlists(&self) -> Result<Vec<PlaylistRef>, ApiError>;

    async fn get_current_user_profile(&self) -> Result<UserProfile, ApiError>;
}

/// Opens a [`PlaylistStore`] that acts with one access token.
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistStoreFactory: Send + Sync {
    fn connect(&self, access_token: &str) -> Arc<dyn PlaylistStore>;
}

#[async_trait::async_trait]
impl<T: PlaylistStore + ?Sized> PlaylistStore for Arc<T> {
    async fn get_playlist_track_count(&self, playlist_id: &str) -> Result<u32, ApiError> {
        (**self).get_playlist_track_count(playlist_id).await
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<Vec<TrackUri>, ApiError> {
        (**self).get_playlist_tracks(playlist_id, offset, limit).await
    }

    async fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        uri: &TrackUri,
    ) -> Result<(), ApiError> {
        (**self).remove_all_occurrences(playlist_id, uri).await
    }

    async fn append_tracks(&self, playlist_id: &str, uris: &[TrackUri]) -> Result<(), ApiError> {
        (**self).append_tracks(playlist_id, uris).await
    }

    async fn list_user_playlists(&self) -> Result<Vec<PlaylistRef>, ApiError> {
        (**self).list_user_playlists().await
    }

    async fn get_current_user_profile(&self) -> Result<UserProfile, ApiError> {
        (**self).get_current_user_profile().await
    }
}

/// Port trait wrapping the OAuth token endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenRequestError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenRequestError>;
}

#[async_trait::async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for Arc<T> {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenRequestError> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenRequestError> {
        (**self).refresh(refresh_token).await
    }
}
