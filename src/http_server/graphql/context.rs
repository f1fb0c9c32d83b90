use std::sync::Arc;

use async_graphql::Context;

use crate::http_server::{graphql_error::GraphqlError, state::AppState};
use crate::ports::spotify::{PlaylistStore, PlaylistStoreFactory};
use crate::services::auth::CredentialLookup;
use crate::services::session::{Credential, SessionHandle};
use crate::spotify_rs::client::ApiError;

pub fn get_app_state<'a>(ctx: &Context<'a>) -> Result<&'a Arc<AppState>, GraphqlError> {
    ctx.data::<Arc<AppState>>()
        .map_err(|_| GraphqlError::FailedToGetAppState)
}

pub fn get_session<'a>(ctx: &Context<'a>) -> Result<&'a SessionHandle, GraphqlError> {
    ctx.data::<SessionHandle>()
        .map_err(|_| GraphqlError::FailedToGetSession)
}

/// Build the error telling the client to restart the login flow, with a fresh consent url.
pub async fn unauthenticated(
    app_state: &AppState,
    session: &SessionHandle,
    reason: String,
) -> GraphqlError {
    let mut context = session.context.lock().await;
    GraphqlError::Unauthenticated {
        reason,
        authorization_url: app_state.authorizer.begin_authorization(&mut context),
    }
}

/// A valid credential for the request's session, refreshing it if needed.
pub async fn require_credential(ctx: &Context<'_>) -> Result<Credential, GraphqlError> {
    let app_state = get_app_state(ctx)?;
    let session = get_session(ctx)?;

    let lookup = {
        let mut context = session.context.lock().await;
        app_state.authorizer.get_valid_credential(&mut context).await
    };

    match lookup {
        Ok(CredentialLookup::Valid(credential)) => Ok(credential),
        Ok(CredentialLookup::NeedsInteractiveAuth) => {
            Err(unauthenticated(app_state, session, "Not logged in to Spotify".to_string()).await)
        }
        Err(error) => Err(unauthenticated(app_state, session, error.to_string()).await),
    }
}

/// The Web API, acting with the credential of the request's session.
pub async fn require_store(ctx: &Context<'_>) -> Result<Arc<dyn PlaylistStore>, GraphqlError> {
    let credential = require_credential(ctx).await?;
    Ok(get_app_state(ctx)?.stores.connect(&credential.access_token))
}

/// Spotify rejected the session's token: remember that, so the next request
/// refreshes it, and tell the client to log in again.
pub async fn token_rejected(ctx: &Context<'_>, reason: String) -> GraphqlError {
    let (app_state, session) = match (get_app_state(ctx), get_session(ctx)) {
        (Ok(app_state), Ok(session)) => (app_state, session),
        (Err(error), _) | (_, Err(error)) => return error,
    };

    app_state
        .authorizer
        .mark_expired(&mut *session.context.lock().await);
    unauthenticated(app_state, session, reason).await
}

/// Map a Web API failure to a GraphQL error. A rejected token sends the user back to login.
pub async fn api_error(ctx: &Context<'_>, error: ApiError, action: &str) -> GraphqlError {
    if let ApiError::Unauthorized(reason) = error {
        return token_rejected(ctx, reason).await;
    }

    GraphqlError::from(color_eyre::Report::new(error).wrap_err(action.to_string()))
}
