use std::sync::Arc;

use crate::ports::spotify::{PlaylistStoreFactory, TokenEndpoint};
use crate::services::auth::SessionAuthorizer;
use crate::services::session::SessionStore;

pub type Authorizer = SessionAuthorizer<Arc<dyn TokenEndpoint>>;

pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub authorizer: Authorizer,
    /// Opens the Web API on behalf of a session's credential
    pub stores: Arc<dyn PlaylistStoreFactory>,
}

impl AppState {
    pub fn new(authorizer: Authorizer, stores: Arc<dyn PlaylistStoreFactory>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            authorizer,
            stores,
        }
    }
}
