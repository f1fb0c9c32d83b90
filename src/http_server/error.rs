use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Failure of an axum handler. The full chain is logged, the client only
/// sees a generic 500.
pub struct Report(color_eyre::Report);

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<E> From<E> for Report
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for Report {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "Request failed");

        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
    }
}
