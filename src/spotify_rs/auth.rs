use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::{
    alphabet,
    engine::{self, general_purpose},
};
use rand::Rng;

use crate::spotify_rs::types::SpotifyTokenResponse;

pub const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

const CUSTOM_ENGINE: engine::GeneralPurpose =
    engine::GeneralPurpose::new(&alphabet::STANDARD, general_purpose::PAD);

/// Generate a cryptographically secure random string from the unreserved URL charset
pub fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            const CHARSET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
            CHARSET[rng.random_range(0..CHARSET.len())] as char
        })
        .collect()
}

/// Generate a random state parameter for CSRF protection
pub fn generate_state() -> String {
    generate_random_string(16)
}

/// Build the interactive consent URL.
///
/// `show_dialog=true` forces Spotify to show the consent screen even if the
/// user already approved the app, so a different account can be chosen.
pub fn authorize_url(client_id: &str, redirect_uri: &str, scopes: &[&str], state: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}&show_dialog=true",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(&scopes.join(" "))
    )
}

#[derive(Debug, thiserror::Error)]
pub enum TokenRequestError {
    #[error("Spotify rejected the grant: {reason}")]
    InvalidGrant { reason: String },
    #[error("Spotify accounts service returned {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// The accounts service answers a bad code or refresh token with 400;
/// anything else is a problem on its side or ours, not the grant's.
fn error_for_status(status: reqwest::StatusCode, body: String) -> TokenRequestError {
    if status == reqwest::StatusCode::BAD_REQUEST {
        TokenRequestError::InvalidGrant { reason: body }
    } else {
        TokenRequestError::UnexpectedStatus { status, body }
    }
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        CUSTOM_ENGINE.encode(format!("{}:{}", client_id, client_secret))
    )
}

async fn request_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    params: &HashMap<&str, &str>,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // This automatically serializes to x-www-form-urlencoded and sets the header (as required by spotify)
        .form(params)
        .header("Authorization", basic_auth_header(client_id, client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(TokenRequestError::FailedToSendRequest)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or("Failed to get error text".to_string());
        return Err(error_for_status(status, body));
    }

    response
        .json()
        .await
        .map_err(TokenRequestError::FailedToParseResponse)
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    // Must be identical to the redirect uri used when building the authorize url
    redirect_uri: &str,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", redirect_uri);

    request_token(client, client_id, client_secret, &params).await
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);
    params.insert("client_id", client_id);

    request_token(client, client_id, client_secret, &params).await
}
