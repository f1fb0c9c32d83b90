use axum::http::{HeaderValue, header::SET_COOKIE};
use axum::response::Response;
use axum_extra::{TypedHeader, headers::Cookie};
use color_eyre::eyre::Result;

pub const SESSION_COOKIE: &str = "playlist_sync_session";

pub fn session_id(cookie: &Option<TypedHeader<Cookie>>) -> Option<&str> {
    cookie
        .as_ref()
        .and_then(|TypedHeader(cookie)| cookie.get(SESSION_COOKIE))
}

fn cookie_value(session_id: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session_id
    )
}

/// Hand a newly stored session id to the browser.
pub fn attach_session_cookie(response: &mut Response, session_id: &str) -> Result<()> {
    let value = HeaderValue::from_str(&cookie_value(session_id))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(())
}
