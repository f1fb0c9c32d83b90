use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::spotify_rs::types::{
    AddTracksRequest, Page, PlaylistTotal, RemoveTracksRequest, SnapshotResponse,
    SpotifyPlaylist, SpotifyPlaylistItem, SpotifyUser, TrackUriObject,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Maximum page size of the playlist items endpoint, also the maximum number
/// of uris accepted by a single add request.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Spotify rejected the access token: {0}")]
    Unauthorized(String),
    #[error("Access to the requested resource was denied: {0}")]
    Forbidden(String),
    #[error("The requested resource was not found: {0}")]
    NotFound(String),
    #[error("Spotify returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

impl ApiError {
    async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or("Failed to get error text".to_string());

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(body),
            StatusCode::FORBIDDEN => ApiError::Forbidden(body),
            StatusCode::NOT_FOUND => ApiError::NotFound(body),
            status => ApiError::Status { status, body },
        }
    }
}

/// Spotify API client
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(client: reqwest::Client, access_token: String) -> Self {
        Self {
            access_token,
            client,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(ApiError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        self.send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(ApiError::FailedToParseResponse)
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser, ApiError> {
        self.get_json(&format!("{}/me", SPOTIFY_API_URL)).await
    }

    /// Get all playlists for the current user
    pub async fn get_user_playlists(&self) -> Result<Vec<SpotifyPlaylist>, ApiError> {
        let mut all_playlists = Vec::new();
        let mut next_url = Some(format!("{}/me/playlists?limit=50", SPOTIFY_API_URL));

        while let Some(url) = next_url {
            let page: Page<SpotifyPlaylist> = self.get_json(&url).await?;
            all_playlists.extend(page.items);
            next_url = page.next;
        }

        Ok(all_playlists)
    }

    /// Total number of items in a playlist
    pub async fn get_playlist_total(&self, playlist_id: &str) -> Result<u32, ApiError> {
        let total: PlaylistTotal = self
            .get_json(&format!(
                "{}/playlists/{}/tracks?fields=total&limit=1",
                SPOTIFY_API_URL,
                urlencoding::encode(playlist_id)
            ))
            .await?;
        Ok(total.total)
    }

    /// Get the track uris of a playlist in list order, starting at `offset`.
    ///
    /// With `limit = None` every remaining item is returned by following the
    /// `next` links. Items without a uri are skipped but still count towards
    /// the limit, matching how Spotify applies offset/limit.
    pub async fn get_playlist_track_uris(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<Vec<String>, ApiError> {
        let mut uris = Vec::new();
        let mut remaining = limit;
        let page_size = limit.map_or(MAX_PAGE_SIZE, |limit| limit.clamp(1, MAX_PAGE_SIZE));
        let mut next_url = Some(format!(
            "{}/playlists/{}/tracks?offset={}&limit={}&fields=items(track(uri)),next",
            SPOTIFY_API_URL,
            urlencoding::encode(playlist_id),
            offset,
            page_size
        ));

        while let Some(url) = next_url {
            if remaining == Some(0) {
                break;
            }

            let page: Page<SpotifyPlaylistItem> = self.get_json(&url).await?;
            let mut items = page.items;
            if let Some(remaining) = remaining.as_mut() {
                items.truncate(*remaining as usize);
                *remaining -= items.len() as u32;
            }

            uris.extend(
                items
                    .into_iter()
                    .filter_map(|item| item.track.and_then(|track| track.uri)),
            );
            next_url = page.next;
        }

        Ok(uris)
    }

    /// Remove every occurrence of the given uris from a playlist
    pub async fn remove_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, ApiError> {
        let body = RemoveTracksRequest {
            tracks: uris
                .iter()
                .map(|uri| TrackUriObject { uri: uri.as_str() })
                .collect(),
        };

        let response: SnapshotResponse = self
            .send(
                self.client
                    .delete(format!(
                        "{}/playlists/{}/tracks",
                        SPOTIFY_API_URL,
                        urlencoding::encode(playlist_id)
                    ))
                    .json(&body),
            )
            .await?
            .json()
            .await
            .map_err(ApiError::FailedToParseResponse)?;

        Ok(response.snapshot_id)
    }

    /// Append uris to the end of a playlist, in order
    pub async fn add_playlist_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<String, ApiError> {
        let mut snapshot_id = String::new();

        for chunk in uris.chunks(MAX_PAGE_SIZE as usize) {
            let response: SnapshotResponse = self
                .send(
                    self.client
                        .post(format!(
                            "{}/playlists/{}/tracks",
                            SPOTIFY_API_URL,
                            urlencoding::encode(playlist_id)
                        ))
                        .json(&AddTracksRequest { uris: chunk }),
                )
                .await?
                .json()
                .await
                .map_err(ApiError::FailedToParseResponse)?;
            snapshot_id = response.snapshot_id;
        }

        Ok(snapshot_id)
    }
}
