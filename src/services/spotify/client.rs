use std::sync::Arc;

use url::Url;

use crate::ports::spotify::{
    PlaylistRef, PlaylistStore, PlaylistStoreFactory, TokenEndpoint, TokenGrant, TrackUri,
    UserProfile,
};
use crate::services::session::Credential;
use crate::spotify_rs::auth::{self, TokenRequestError};
use crate::spotify_rs::client::{ApiError, SpotifyClient};
use crate::spotify_rs::types::SpotifyTokenResponse;

pub const SPOTIFY_SCOPES: [&str; 5] = [
    "playlist-modify-public",
    "playlist-modify-private",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-read-private",
];

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
}

impl SpotifyApiCredentials {
    pub fn new(client_id: String, client_secret: String, redirect_uri: Url) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

impl From<SpotifyTokenResponse> for TokenGrant {
    fn from(response: SpotifyTokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in_secs: response.expires_in,
        }
    }
}

/// Talks to the accounts service with the app's client credentials.
pub struct SpotifyTokenAdapter {
    client: reqwest::Client,
    credentials: SpotifyApiCredentials,
}

impl SpotifyTokenAdapter {
    pub fn new(credentials: SpotifyApiCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl TokenEndpoint for SpotifyTokenAdapter {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenRequestError> {
        auth::exchange_code_for_token(
            &self.client,
            self.credentials.client_id(),
            self.credentials.client_secret(),
            code,
            self.credentials.redirect_uri().as_str(),
        )
        .await
        .map(TokenGrant::from)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenRequestError> {
        auth::refresh_access_token(
            &self.client,
            self.credentials.client_id(),
            self.credentials.client_secret(),
            refresh_token,
        )
        .await
        .map(TokenGrant::from)
    }
}

/// Playlist store backed by the Spotify Web API, authorized by one credential.
pub struct SpotifyHttpAdapter {
    client: SpotifyClient,
}

impl SpotifyHttpAdapter {
    pub fn new(credential: &Credential) -> Self {
        Self::with_client(reqwest::Client::new(), credential.access_token.clone())
    }

    pub fn with_client(client: reqwest::Client, access_token: String) -> Self {
        Self {
            client: SpotifyClient::new(client, access_token),
        }
    }
}

/// Hands out Web API adapters that share one connection pool.
#[derive(Default)]
pub struct SpotifyStoreFactory {
    client: reqwest::Client,
}

impl PlaylistStoreFactory for SpotifyStoreFactory {
    fn connect(&self, access_token: &str) -> Arc<dyn PlaylistStore> {
        Arc::new(SpotifyHttpAdapter::with_client(
            self.client.clone(),
            access_token.to_string(),
        ))
    }
}

#[async_trait::async_trait]
impl PlaylistStore for SpotifyHttpAdapter {
    async fn get_playlist_track_count(&self, playlist_id: &str) -> Result<u32, ApiError> {
        self.client.get_playlist_total(playlist_id).await
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<Vec<TrackUri>, ApiError> {
        let uris = self
            .client
            .get_playlist_track_uris(playlist_id, offset, limit)
            .await?;
        Ok(uris.into_iter().map(TrackUri::from).collect())
    }

    async fn remove_all_occurrences(
        &self,
        playlist_id: &str,
        uri: &TrackUri,
    ) -> Result<(), ApiError> {
        self.client
            .remove_playlist_tracks(playlist_id, &[uri.as_str().to_string()])
            .await?;
        Ok(())
    }

    async fn append_tracks(&self, playlist_id: &str, uris: &[TrackUri]) -> Result<(), ApiError> {
        let uris: Vec<String> = uris.iter().map(|uri| uri.as_str().to_string()).collect();
        self.client.add_playlist_tracks(playlist_id, &uris).await?;
        Ok(())
    }

    async fn list_user_playlists(&self) -> Result<Vec<PlaylistRef>, ApiError> {
        let playlists = self.client.get_user_playlists().await?;
        Ok(playlists
            .into_iter()
            .map(|playlist| PlaylistRef {
                id: playlist.id,
                name: playlist.name,
                owner: playlist.owner.and_then(|owner| owner.display_name),
                total_tracks: playlist.tracks.total,
            })
            .collect())
    }

    async fn get_current_user_profile(&self) -> Result<UserProfile, ApiError> {
        let user = self.client.get_current_user().await?;
        Ok(UserProfile {
            id: user.id,
            display_name: user.display_name,
        })
    }
}
