use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// Spotify playlist from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: Option<SpotifyPlaylistOwner>,
    pub tracks: SpotifyPlaylistTracks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistTracks {
    pub total: u32,
}

/// One entry of a playlist's item list. `track` is null when the track was
/// removed from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistItem {
    pub track: Option<SpotifyTrackRef>,
}

/// Only the uri is requested through the `fields` filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrackRef {
    pub uri: Option<String>,
}

/// Generic paging envelope used by the list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Response of `GET /playlists/{id}/tracks?fields=total`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTotal {
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackUriObject<'a> {
    pub uri: &'a str,
}

/// Body of `DELETE /playlists/{id}/tracks`. Every occurrence of each uri is removed.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveTracksRequest<'a> {
    pub tracks: Vec<TrackUriObject<'a>>,
}

/// Body of `POST /playlists/{id}/tracks`
#[derive(Debug, Clone, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
}
