use async_graphql::{Error, ErrorExtensions};

use crate::services::auth::AuthError;
use crate::services::spotify::sync::SyncError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphqlError {
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Failed to get app state")]
    FailedToGetAppState,
    #[error("Failed to get session")]
    FailedToGetSession,
    /// The session has no usable credential; the client should send the user to `authorization_url`.
    #[error("{reason}")]
    Unauthenticated {
        reason: String,
        authorization_url: String,
    },
    #[error("{0}")]
    Auth(AuthError),
    #[error("{0}")]
    Sync(SyncError),
}

impl Default for GraphqlError {
    fn default() -> Self {
        Self::ServerError("Unknown error".to_string())
    }
}

impl From<color_eyre::Report> for GraphqlError {
    fn from(report: color_eyre::Report) -> Self {
        // Log the full error report with trace chain for debugging
        tracing::error!("GraphQL error: {:#?}", report);
        Self::ServerError(report.to_string())
    }
}

impl From<AuthError> for GraphqlError {
    fn from(error: AuthError) -> Self {
        Self::Auth(error)
    }
}

impl From<SyncError> for GraphqlError {
    fn from(error: SyncError) -> Self {
        Self::Sync(error)
    }
}

impl ErrorExtensions for GraphqlError {
    fn extend(&self) -> Error {
        Error::new(format!("{}", self)).extend_with(|_err, e| match self {
            GraphqlError::ServerError(reason) => {
                e.set("code", "SERVER_ERROR");
                e.set("reason", reason.clone());
            }
            GraphqlError::FailedToGetAppState | GraphqlError::FailedToGetSession => {
                e.set("code", "SERVER_ERROR");
                e.set("reason", self.to_string());
            }
            GraphqlError::Unauthenticated {
                reason,
                authorization_url,
            } => {
                e.set("code", "UNAUTHENTICATED");
                e.set("reason", reason.clone());
                e.set("authorizationUrl", authorization_url.clone());
            }
            GraphqlError::Auth(error) => {
                e.set("code", "AUTH_FAILED");
                e.set("reason", error.to_string());
            }
            GraphqlError::Sync(error) => {
                e.set("code", "SYNC_FAILED");
                e.set("reason", error.to_string());
            }
        })
    }
}

// Newtype wrapper to avoid blanket From implementation conflict for GraphqlError and async_graphql::Error
#[derive(Debug, Clone)]
pub struct GraphqlErrorWrapper(GraphqlError);

impl From<GraphqlError> for GraphqlErrorWrapper {
    fn from(err: GraphqlError) -> Self {
        Self(err)
    }
}

impl From<GraphqlErrorWrapper> for Error {
    fn from(wrapper: GraphqlErrorWrapper) -> Self {
        wrapper.0.extend()
    }
}

// Make it easy to convert from color_eyre::Report
impl From<color_eyre::Report> for GraphqlErrorWrapper {
    fn from(report: color_eyre::Report) -> Self {
        GraphqlError::from(report).into()
    }
}

impl From<AuthError> for GraphqlErrorWrapper {
    fn from(error: AuthError) -> Self {
        GraphqlError::from(error).into()
    }
}

impl From<SyncError> for GraphqlErrorWrapper {
    fn from(error: SyncError) -> Self {
        GraphqlError::from(error).into()
    }
}

pub type GraphqlResult<T> = Result<T, GraphqlErrorWrapper>;
