use async_graphql::{Context, Enum, Object};

use crate::http_server::graphql::context::{get_app_state, get_session};
use crate::http_server::graphql_error::GraphqlResult;
use crate::services::session::AuthState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum AuthStatus {
    Unauthenticated,
    Exchanging,
    Authenticated,
    Expired,
}

impl From<&AuthState> for AuthStatus {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::Unauthenticated => AuthStatus::Unauthenticated,
            AuthState::Exchanging => AuthStatus::Exchanging,
            AuthState::Authenticated(credential) if credential.is_expired() => AuthStatus::Expired,
            AuthState::Authenticated(_) => AuthStatus::Authenticated,
            AuthState::Expired(_) => AuthStatus::Expired,
        }
    }
}

#[derive(Default)]
pub struct AuthQuery;

#[Object]
impl AuthQuery {
    /// Spotify consent url for this session. Each call issues a new CSRF state.
    async fn authorization_url(&self, ctx: &Context<'_>) -> GraphqlResult<String> {
        let app_state = get_app_state(ctx)?;
        let session = get_session(ctx)?;

        let mut context = session.context.lock().await;
        Ok(app_state.authorizer.begin_authorization(&mut context))
    }

    async fn auth_status(&self, ctx: &Context<'_>) -> GraphqlResult<AuthStatus> {
        let session = get_session(ctx)?;
        let context = session.context.lock().await;
        Ok(AuthStatus::from(context.state()))
    }
}
