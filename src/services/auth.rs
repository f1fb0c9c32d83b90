use chrono::Utc;
use url::Url;

use crate::ports::spotify::TokenEndpoint;
use crate::services::session::{AuthState, Credential, SessionContext};
use crate::services::spotify::client::SPOTIFY_SCOPES;
use crate::spotify_rs::auth::{TokenRequestError, authorize_url, generate_state};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("The authorization code is invalid or has expired, please log in again ({0})")]
    InvalidOrExpiredCode(String),
    #[error("Failed to refresh the Spotify session, please log in again ({0})")]
    RefreshFailed(String),
    #[error("Could not reach Spotify, please log in again ({0})")]
    Network(String),
    #[error("Spotify access was not granted: {0}")]
    AccessDenied(String),
    #[error("No authorization code found in the pasted value")]
    MissingCode,
    #[error("The login response does not belong to this session, please log in again")]
    StateMismatch,
    #[error("Not logged in to Spotify")]
    NeedsInteractiveAuth,
}

impl AuthError {
    fn from_exchange(error: TokenRequestError) -> Self {
        match error {
            TokenRequestError::InvalidGrant { reason } => AuthError::InvalidOrExpiredCode(reason),
            other => AuthError::Network(other.to_string()),
        }
    }

    fn from_refresh(error: TokenRequestError) -> Self {
        match error {
            TokenRequestError::InvalidGrant { reason } => AuthError::RefreshFailed(reason),
            other => AuthError::Network(other.to_string()),
        }
    }
}

/// Outcome of asking a session for a usable credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialLookup {
    Valid(Credential),
    NeedsInteractiveAuth,
}

impl CredentialLookup {
    pub fn into_credential(self) -> Result<Credential, AuthError> {
        match self {
            CredentialLookup::Valid(credential) => Ok(credential),
            CredentialLookup::NeedsInteractiveAuth => Err(AuthError::NeedsInteractiveAuth),
        }
    }
}

/// What Spotify sent back to the redirect uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub code: String,
    pub state: Option<String>,
}

/// Pull the authorization code (and CSRF state, if present) out of whatever
/// the user handed us: a bare code, or the full url Spotify redirected to.
pub fn parse_authorization_response(input: &str) -> Result<AuthorizationResponse, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::MissingCode);
    }

    let query = match Url::parse(input) {
        Ok(url) => url.query().map(str::to_string),
        Err(_) if input.contains("code=") || input.contains("error=") => input
            .split_once('?')
            .map_or(Some(input.to_string()), |(_, query)| Some(query.to_string())),
        Err(_) => {
            return Ok(AuthorizationResponse {
                code: input.to_string(),
                state: None,
            });
        }
    };

    let query = query.ok_or(AuthError::MissingCode)?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "error" => return Err(AuthError::AccessDenied(value.into_owned())),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code
        .filter(|code| !code.is_empty())
        .ok_or(AuthError::MissingCode)?;
    Ok(AuthorizationResponse { code, state })
}

/// Drives the authorization state machine of a single session.
///
/// The authorizer itself is stateless; all state lives in the
/// [`SessionContext`] passed to each call.
pub struct SessionAuthorizer<T: TokenEndpoint> {
    client_id: String,
    redirect_uri: Url,
    tokens: T,
}

impl<T: TokenEndpoint> SessionAuthorizer<T> {
    pub fn new(client_id: String, redirect_uri: Url, tokens: T) -> Self {
        Self {
            client_id,
            redirect_uri,
            tokens,
        }
    }

    /// The consent url for the fixed scope set, carrying the given CSRF state.
    pub fn request_authorization_url(&self, csrf_state: &str) -> String {
        authorize_url(
            &self.client_id,
            self.redirect_uri.as_str(),
            &SPOTIFY_SCOPES,
            csrf_state,
        )
    }

    /// Issue a consent url for this session and remember its CSRF state.
    /// The authorization state of the session is left untouched.
    pub fn begin_authorization(&self, session: &mut SessionContext) -> String {
        let csrf_state = generate_state();
        let url = self.request_authorization_url(&csrf_state);
        session.pending_csrf_state = Some(csrf_state);
        url
    }

    /// Exchange a one-time authorization code for a credential and cache it in the session.
    #[tracing::instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn exchange_code(
        &self,
        session: &mut SessionContext,
        code: &str,
        csrf_state: Option<&str>,
    ) -> Result<Credential, AuthError> {
        // A login this session started must come back with its own state
        match (session.pending_csrf_state.as_deref(), csrf_state) {
            (Some(issued), Some(returned)) if issued == returned => {}
            (None, None) => {}
            _ => {
                tracing::warn!("Authorization response state does not match the issued state");
                return Err(AuthError::StateMismatch);
            }
        }
        session.pending_csrf_state = None;

        session.state = AuthState::Exchanging;
        match self.tokens.exchange_code(code).await {
            Ok(grant) => {
                let credential = Credential::from_grant(grant, Utc::now(), None);
                session.state = AuthState::Authenticated(credential.clone());
                tracing::info!(expires_at = %credential.expires_at, "Spotify authorization completed");
                Ok(credential)
            }
            Err(error) => {
                session.state = AuthState::Unauthenticated;
                tracing::warn!("Failed to exchange authorization code: {}", error);
                Err(AuthError::from_exchange(error))
            }
        }
    }

    /// Return a usable credential, refreshing it once if it has expired.
    ///
    /// No network call is made while the cached credential is still valid.
    #[tracing::instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn get_valid_credential(
        &self,
        session: &mut SessionContext,
    ) -> Result<CredentialLookup, AuthError> {
        let now = Utc::now();
        let expired = match &session.state {
            AuthState::Authenticated(credential) if !credential.is_expired_at(now) => {
                return Ok(CredentialLookup::Valid(credential.clone()));
            }
            AuthState::Authenticated(credential) | AuthState::Expired(credential) => {
                credential.clone()
            }
            AuthState::Unauthenticated | AuthState::Exchanging => {
                return Ok(CredentialLookup::NeedsInteractiveAuth);
            }
        };

        let Some(refresh_token) = expired.refresh_token.clone() else {
            tracing::info!("Credential expired and no refresh token is available");
            session.state = AuthState::Unauthenticated;
            return Ok(CredentialLookup::NeedsInteractiveAuth);
        };

        session.state = AuthState::Exchanging;
        match self.tokens.refresh(&refresh_token).await {
            Ok(grant) => {
                let credential = Credential::from_grant(grant, Utc::now(), Some(refresh_token));
                session.state = AuthState::Authenticated(credential.clone());
                tracing::info!(expires_at = %credential.expires_at, "Refreshed Spotify credential");
                Ok(CredentialLookup::Valid(credential))
            }
            Err(error) => {
                session.state = AuthState::Unauthenticated;
                tracing::warn!("Failed to refresh Spotify credential: {}", error);
                Err(AuthError::from_refresh(error))
            }
        }
    }

    /// Spotify rejected the cached credential before its expiry. The next
    /// lookup refreshes it instead of handing it out again.
    pub fn mark_expired(&self, session: &mut SessionContext) {
        if let AuthState::Authenticated(credential) = &session.state {
            tracing::info!(session_id = %session.id(), "Spotify rejected the access token");
            session.state = AuthState::Expired(credential.clone());
        }
    }

    /// Forget the session's credential.
    pub fn logout(&self, session: &mut SessionContext) {
        session.state = AuthState::Unauthenticated;
        session.pending_csrf_state = None;
    }
}
