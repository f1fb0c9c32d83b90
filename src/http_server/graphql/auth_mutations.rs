use async_graphql::{Context, Object};

use crate::http_server::graphql::context::{api_error, get_app_state, get_session};
use crate::http_server::graphql::playlist_queries::UserProfile;
use crate::http_server::graphql_error::GraphqlResult;
use crate::ports::spotify::{PlaylistStore, PlaylistStoreFactory};
use crate::services::auth::parse_authorization_response;

#[derive(Default)]
pub struct AuthMutation;

#[Object]
impl AuthMutation {
    /// Complete Spotify OAuth by exchanging the code for a credential.
    ///
    /// `code` may be the whole redirect url, or the bare code together with `state`.
    async fn complete_auth(
        &self,
        ctx: &Context<'_>,
        code: String,
        state: Option<String>,
    ) -> GraphqlResult<UserProfile> {
        let app_state = get_app_state(ctx)?;
        let session = get_session(ctx)?;

        let response = parse_authorization_response(&code)?;
        let csrf_state = state.or(response.state);

        let credential = {
            let mut context = session.context.lock().await;
            app_state
                .authorizer
                .exchange_code(&mut context, &response.code, csrf_state.as_deref())
                .await?
        };

        let store = app_state.stores.connect(&credential.access_token);
        match store.get_current_user_profile().await {
            Ok(profile) => Ok(profile.into()),
            Err(error) => Err(api_error(ctx, error, "Failed to fetch user profile").await.into()),
        }
    }

    /// Forget this session's Spotify credential and the session itself
    async fn logout(&self, ctx: &Context<'_>) -> GraphqlResult<bool> {
        let app_state = get_app_state(ctx)?;
        let session = get_session(ctx)?;

        app_state
            .authorizer
            .logout(&mut *session.context.lock().await);
        app_state.sessions.remove(&session.id).await;
        Ok(true)
    }
}
