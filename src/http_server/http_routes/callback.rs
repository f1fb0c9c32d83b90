use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{TypedHeader, headers::Cookie};
use serde::Deserialize;

use crate::http_server::error::Report;
use crate::http_server::session_cookie::{attach_session_cookie, session_id};
use crate::http_server::state::AppState;
use crate::services::auth::AuthError;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// OAuth redirect target. Exchanges the code for the caller's session and
/// sends the browser back to the app. The `state` issued with the consent url
/// must come back with the code.
pub async fn callback(
    State(app_state): State<Arc<AppState>>,
    cookie: Option<TypedHeader<Cookie>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, Report> {
    let session = app_state.sessions.resume(session_id(&cookie)).await;

    let result = match (params.error, params.code, params.state) {
        (Some(error), _, _) => Err(AuthError::AccessDenied(error)),
        (None, Some(code), Some(state)) if !code.is_empty() => {
            let mut context = session.context.lock().await;
            app_state
                .authorizer
                .exchange_code(&mut context, &code, Some(&state))
                .await
                .map(|_| ())
        }
        (None, Some(code), None) if !code.is_empty() => Err(AuthError::StateMismatch),
        (None, _, _) => Err(AuthError::MissingCode),
    };

    let mut response = match result {
        Ok(()) => Redirect::to("/").into_response(),
        Err(error) => {
            tracing::warn!(session_id = %session.id, "Spotify callback failed: {}", error);
            (StatusCode::BAD_REQUEST, error.to_string()).into_response()
        }
    };
    if app_state.sessions.commit(&session).await {
        attach_session_cookie(&mut response, &session.id)?;
    }
    Ok(response)
}
