use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql::{EmptySubscription, MergedObject, Schema};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Extension;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum_extra::{TypedHeader, headers::Cookie};

use crate::http_server::error::Report;
use crate::http_server::session_cookie::{attach_session_cookie, session_id};
use crate::http_server::state::AppState;

pub mod auth_mutations;
pub mod auth_queries;
mod context;
pub mod playlist_queries;
pub mod sync_mutations;

use auth_mutations::AuthMutation;
use auth_queries::AuthQuery;
use playlist_queries::PlaylistQuery;
use sync_mutations::SyncMutation;

#[derive(Default, MergedObject)]
pub struct Query(AuthQuery, PlaylistQuery);

#[derive(Default, MergedObject)]
pub struct Mutation(AuthMutation, SyncMutation);

pub type AppSchema = Schema<Query, Mutation, EmptySubscription>;

pub async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

pub fn create_schema(app_state: Arc<AppState>) -> AppSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(app_state)
        .finish()
}

/// Executes a request inside the caller's session. A session started by this
/// request is only kept, and its cookie only set, once it holds state.
pub async fn graphql_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(schema): Extension<AppSchema>,
    cookie: Option<TypedHeader<Cookie>>,
    request: GraphQLRequest,
) -> Result<Response, Report> {
    let session = app_state.sessions.resume(session_id(&cookie)).await;
    let request = request.into_inner().data(session.clone());

    let mut response = GraphQLResponse::from(schema.execute(request).await).into_response();
    if app_state.sessions.commit(&session).await {
        attach_session_cookie(&mut response, &session.id)?;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_graphql::{Request, Value};
    use chrono::{Duration, Utc};
    use url::Url;

    use super::*;
    use crate::ports::spotify::{
        MockPlaylistStore, MockPlaylistStoreFactory, MockTokenEndpoint, PlaylistStore,
        PlaylistStoreFactory, TokenEndpoint, TokenGrant, TrackUri,
    };
    use crate::services::auth::SessionAuthorizer;
    use crate::services::session::{AuthState, Credential, SessionHandle};
    use crate::spotify_rs::auth::TokenRequestError;
    use crate::spotify_rs::client::ApiError;

    fn app_state_with_stores(
        tokens: MockTokenEndpoint,
        stores: MockPlaylistStoreFactory,
    ) -> Arc<AppState> {
        let tokens: Arc<dyn TokenEndpoint> = Arc::new(tokens);
        let stores: Arc<dyn PlaylistStoreFactory> = Arc::new(stores);
        let authorizer = SessionAuthorizer::new(
            "client-id".to_string(),
            Url::parse("http://127.0.0.1:3000/callback").unwrap(),
            tokens,
        );
        Arc::new(AppState::new(authorizer, stores))
    }

    fn app_state(tokens: MockTokenEndpoint) -> Arc<AppState> {
        let mut stores = MockPlaylistStoreFactory::new();
        stores.expect_connect().never();
        app_state_with_stores(tokens, stores)
    }

    fn credential(access_token: &str, expires_in: Duration, refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_at: Utc::now() + expires_in,
        }
    }

    async fn authenticated_session(app_state: &AppState, credential: Credential) -> SessionHandle {
        let session = app_state.sessions.resume(None).await;
        session.context.lock().await.state = AuthState::Authenticated(credential);
        app_state.sessions.commit(&session).await;
        session
    }

    async fn execute(
        app_state: &Arc<AppState>,
        session: &SessionHandle,
        query: &str,
    ) -> async_graphql::Response {
        let schema = create_schema(app_state.clone());
        schema
            .execute(Request::new(query).data(session.clone()))
            .await
    }

    fn error_code(response: &async_graphql::Response) -> Option<Value> {
        response.errors[0]
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code").cloned())
    }

    #[tokio::test]
    async fn test_new_session_is_unauthenticated() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session = app_state.sessions.resume(None).await;

        let response = execute(&app_state, &session, "{ authStatus }").await;

        assert!(response.errors.is_empty());
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "authStatus": "UNAUTHENTICATED" })
        );
    }

    #[tokio::test]
    async fn test_authorization_url_records_csrf_state() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session = app_state.sessions.resume(None).await;

        let response = execute(&app_state, &session, "{ authorizationUrl }").await;
        let json = response.data.into_json().unwrap();
        let url = json["authorizationUrl"].as_str().unwrap();

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("show_dialog=true"));

        let pending = session.context.lock().await.pending_csrf_state.clone().unwrap();
        assert!(url.contains(&format!("state={}", pending)));
    }

    #[tokio::test]
    async fn test_complete_auth_rejects_foreign_state() {
        // no expectations: the token endpoint must not be called
        let app_state = app_state(MockTokenEndpoint::new());
        let session = app_state.sessions.resume(None).await;
        execute(&app_state, &session, "{ authorizationUrl }").await;

        let response = execute(
            &app_state,
            &session,
            r#"mutation { completeAuth(code: "abc", state: "not-ours") { id } }"#,
        )
        .await;

        assert_eq!(error_code(&response), Some(Value::from("AUTH_FAILED")));
        assert_eq!(
            response.errors[0].message,
            "The login response does not belong to this session, please log in again"
        );
    }

    #[tokio::test]
    async fn test_complete_auth_with_rejected_code() {
        let mut tokens = MockTokenEndpoint::new();
        tokens
            .expect_exchange_code()
            .withf(|code| code == "stale-code")
            .times(1)
            .returning(|_| {
                Err(TokenRequestError::InvalidGrant {
                    reason: "invalid_grant".to_string(),
                })
            });
        let app_state = app_state(tokens);
        let session = app_state.sessions.resume(None).await;

        let response = execute(
            &app_state,
            &session,
            r#"mutation { completeAuth(code: "http://127.0.0.1:3000/callback?code=stale-code") { id } }"#,
        )
        .await;

        assert_eq!(error_code(&response), Some(Value::from("AUTH_FAILED")));
        assert_eq!(
            *session.context.lock().await.state(),
            AuthState::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_complete_auth_fetches_profile_with_new_token() {
        let mut tokens = MockTokenEndpoint::new();
        tokens.expect_exchange_code().times(1).returning(|_| {
            Ok(TokenGrant {
                access_token: "fresh".to_string(),
                refresh_token: Some("rt".to_string()),
                expires_in_secs: 3600,
            })
        });
        let mut stores = MockPlaylistStoreFactory::new();
        stores
            .expect_connect()
            .withf(|access_token| access_token == "fresh")
            .times(1)
            .returning(|_| {
                let mut store = MockPlaylistStore::new();
                store.expect_get_current_user_profile().returning(|| {
                    Ok(crate::ports::spotify::UserProfile {
                        id: "user-1".to_string(),
                        display_name: Some("Ada".to_string()),
                    })
                });
                Arc::new(store) as Arc<dyn PlaylistStore>
            });
        let app_state = app_state_with_stores(tokens, stores);
        let session = app_state.sessions.resume(None).await;
        let url = execute(&app_state, &session, "{ authorizationUrl }").await;
        let url = url.data.into_json().unwrap()["authorizationUrl"]
            .as_str()
            .unwrap()
            .to_string();
        let state = Url::parse(&url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap();

        let query = format!(
            r#"mutation {{ completeAuth(code: "http://127.0.0.1:3000/callback?code=abc&state={state}") {{ id displayName }} }}"#
        );
        let response = execute(&app_state, &session, &query).await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "completeAuth": { "id": "user-1", "displayName": "Ada" } })
        );
    }

    #[tokio::test]
    async fn test_playlists_requires_login() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session = app_state.sessions.resume(None).await;

        let response = execute(&app_state, &session, "{ playlists { id name } }").await;

        assert_eq!(error_code(&response), Some(Value::from("UNAUTHENTICATED")));
        let extensions = response.errors[0].extensions.as_ref().unwrap();
        assert!(extensions.get("authorizationUrl").is_some());
        assert!(session.context.lock().await.pending_csrf_state.is_some());
    }

    #[tokio::test]
    async fn test_sync_reports_negative_count() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session = app_state.sessions.resume(None).await;

        let response = execute(
            &app_state,
            &session,
            r#"mutation { syncPlaylists(sourceId: "a", targetId: "b", count: -1) { added } }"#,
        )
        .await;

        assert_eq!(error_code(&response), Some(Value::from("SYNC_FAILED")));
        assert_eq!(
            response.errors[0].message,
            "Track count must be between 1 and 100, got -1"
        );
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_session_authenticated() {
        let mut stores = MockPlaylistStoreFactory::new();
        stores.expect_connect().returning(|_| {
            let mut store = MockPlaylistStore::new();
            store.expect_get_playlist_track_count().returning(|_| {
                Err(ApiError::Status {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    body: "try later".to_string(),
                })
            });
            store
                .expect_get_playlist_tracks()
                .returning(|_, _, _| Ok(Vec::new()));
            Arc::new(store) as Arc<dyn PlaylistStore>
        });
        let app_state = app_state_with_stores(MockTokenEndpoint::new(), stores);
        let cached = credential("at", Duration::hours(1), Some("rt"));
        let session = authenticated_session(&app_state, cached.clone()).await;

        let response = execute(
            &app_state,
            &session,
            r#"mutation { syncPlaylists(sourceId: "a", targetId: "b", count: 5) { added } }"#,
        )
        .await;

        assert_eq!(error_code(&response), Some(Value::from("SYNC_FAILED")));
        assert!(response.errors[0].message.starts_with("Spotify is unavailable"));
        assert_eq!(
            *session.context.lock().await.state(),
            AuthState::Authenticated(cached)
        );
    }

    #[tokio::test]
    async fn test_sync_refreshes_expired_credential_first() {
        let mut tokens = MockTokenEndpoint::new();
        tokens
            .expect_refresh()
            .withf(|refresh_token| refresh_token == "rt")
            .times(1)
            .returning(|_| {
                Ok(TokenGrant {
                    access_token: "fresh".to_string(),
                    refresh_token: None,
                    expires_in_secs: 3600,
                })
            });
        let appended = Arc::new(Mutex::new(Vec::<TrackUri>::new()));
        let appended_by_store = appended.clone();
        let mut stores = MockPlaylistStoreFactory::new();
        stores
            .expect_connect()
            .withf(|access_token| access_token == "fresh")
            .times(1)
            .returning(move |_| {
                let appended = appended_by_store.clone();
                let mut store = MockPlaylistStore::new();
                store
                    .expect_get_playlist_track_count()
                    .returning(|_| Ok(1));
                store
                    .expect_get_playlist_tracks()
                    .returning(|playlist_id, _, _| {
                        Ok(if playlist_id == "src" {
                            vec![TrackUri::from("spotify:track:a")]
                        } else {
                            Vec::new()
                        })
                    });
                store.expect_append_tracks().times(1).returning(move |_, uris| {
                    appended.lock().unwrap().extend(uris.iter().cloned());
                    Ok(())
                });
                Arc::new(store) as Arc<dyn PlaylistStore>
            });
        let app_state = app_state_with_stores(tokens, stores);
        let session =
            authenticated_session(&app_state, credential("old", -Duration::hours(1), Some("rt")))
                .await;

        let response = execute(
            &app_state,
            &session,
            r#"mutation { syncPlaylists(sourceId: "src", targetId: "dst", count: 5) { added removed message } }"#,
        )
        .await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "syncPlaylists": {
                "added": 1,
                "removed": 0,
                "message": "1 new tracks added to target playlist."
            } })
        );
        assert_eq!(*appended.lock().unwrap(), vec![TrackUri::from("spotify:track:a")]);
        let context = session.context.lock().await;
        assert_eq!(context.credential().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn test_rejected_token_marks_credential_expired() {
        let mut stores = MockPlaylistStoreFactory::new();
        stores.expect_connect().returning(|_| {
            let mut store = MockPlaylistStore::new();
            store
                .expect_list_user_playlists()
                .returning(|| Err(ApiError::Unauthorized("revoked".to_string())));
            Arc::new(store) as Arc<dyn PlaylistStore>
        });
        let app_state = app_state_with_stores(MockTokenEndpoint::new(), stores);
        let cached = credential("at", Duration::hours(1), Some("rt"));
        let session = authenticated_session(&app_state, cached.clone()).await;

        let response = execute(&app_state, &session, "{ playlists { id } }").await;

        assert_eq!(error_code(&response), Some(Value::from("UNAUTHENTICATED")));
        assert_eq!(
            *session.context.lock().await.state(),
            AuthState::Expired(cached)
        );
    }

    #[tokio::test]
    async fn test_expired_credential_without_refresh_token_needs_login() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session =
            authenticated_session(&app_state, credential("old", Duration::zero(), None)).await;

        let status = execute(&app_state, &session, "{ authStatus }").await;
        assert_eq!(
            status.data.into_json().unwrap(),
            serde_json::json!({ "authStatus": "EXPIRED" })
        );

        let response = execute(&app_state, &session, "{ me { id } }").await;
        assert_eq!(error_code(&response), Some(Value::from("UNAUTHENTICATED")));
        assert_eq!(
            *session.context.lock().await.state(),
            AuthState::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_logout_forgets_session() {
        let app_state = app_state(MockTokenEndpoint::new());
        let session =
            authenticated_session(&app_state, credential("at", Duration::hours(1), None)).await;
        assert_eq!(app_state.sessions.len().await, 1);

        let response = execute(&app_state, &session, "mutation { logout }").await;

        assert!(response.errors.is_empty());
        assert_eq!(
            *session.context.lock().await.state(),
            AuthState::Unauthenticated
        );
        assert_eq!(app_state.sessions.len().await, 0);
    }
}
