use async_graphql::{Context, ID, Object, SimpleObject};

use crate::http_server::graphql::context::{api_error, require_store};
use crate::http_server::graphql_error::GraphqlResult;
use crate::ports::spotify::{PlaylistRef, PlaylistStore};

#[derive(Debug, Clone, SimpleObject)]
pub struct Playlist {
    /// Select playlists by id; names are not unique.
    pub id: ID,
    pub name: String,
    pub owner: Option<String>,
    pub track_count: i64,
}

impl From<PlaylistRef> for Playlist {
    fn from(playlist: PlaylistRef) -> Self {
        Self {
            id: ID(playlist.id),
            name: playlist.name,
            owner: playlist.owner,
            track_count: playlist.total_tracks as i64,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

impl From<crate::ports::spotify::UserProfile> for UserProfile {
    fn from(profile: crate::ports::spotify::UserProfile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.display_name,
        }
    }
}

#[derive(Default)]
pub struct PlaylistQuery;

#[Object]
impl PlaylistQuery {
    /// The logged in Spotify user
    async fn me(&self, ctx: &Context<'_>) -> GraphqlResult<UserProfile> {
        let store = require_store(ctx).await?;

        match store.get_current_user_profile().await {
            Ok(profile) => Ok(profile.into()),
            Err(error) => Err(api_error(ctx, error, "Failed to fetch user profile").await.into()),
        }
    }

    /// All playlists the logged in user follows or owns
    async fn playlists(&self, ctx: &Context<'_>) -> GraphqlResult<Vec<Playlist>> {
        let store = require_store(ctx).await?;

        match store.list_user_playlists().await {
            Ok(playlists) => Ok(playlists.into_iter().map(Playlist::from).collect()),
            Err(error) => Err(api_error(ctx, error, "Failed to fetch playlists").await.into()),
        }
    }
}
