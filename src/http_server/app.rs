use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use color_eyre::eyre::{Context, eyre};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
#[cfg(not(debug_assertions))]
use {
    axum::http::{HeaderValue, Method, header::CONTENT_TYPE},
    tower_http::cors::AllowOrigin,
};

use crate::{
    http_server::{
        cleanup_tasks::spawn_session_cleanup, graphql, http_routes::callback::callback,
        state::AppState,
    },
    ports::spotify::TokenEndpoint,
    services::{
        auth::SessionAuthorizer,
        spotify::client::{SpotifyApiCredentials, SpotifyStoreFactory, SpotifyTokenAdapter},
    },
};

pub struct HttpServerConfig {
    pub port: u16,
    pub credentials: SpotifyApiCredentials,
}

async fn root() -> &'static str {
    "playlist-sync is running"
}

pub fn router(app_state: Arc<AppState>, allowed_origin: &url::Url) -> color_eyre::Result<Router> {
    let schema = graphql::create_schema(app_state.clone());

    #[cfg(debug_assertions)]
    let cors_layer = {
        let _ = allowed_origin;
        CorsLayer::permissive()
    };

    // The session cookie has to cross origins, so only the app's own origin is allowed
    #[cfg(not(debug_assertions))]
    let cors_layer = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(
            HeaderValue::from_str(&allowed_origin.origin().ascii_serialization())
                .wrap_err("Redirect uri has no valid origin")?,
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Ok(Router::new()
        .route("/", get(root))
        .route("/callback", get(callback))
        .route(
            "/graphql",
            get(graphql::graphiql).post(graphql::graphql_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(Extension(schema)),
        )
        .with_state(app_state))
}

pub async fn start(config: HttpServerConfig) -> color_eyre::Result<()> {
    let HttpServerConfig { port, credentials } = config;
    let redirect_uri = credentials.redirect_uri().clone();

    let tokens: Arc<dyn TokenEndpoint> = Arc::new(SpotifyTokenAdapter::new(credentials.clone()));
    let authorizer = SessionAuthorizer::new(
        credentials.client_id().to_string(),
        redirect_uri.clone(),
        tokens,
    );
    let app_state = Arc::new(AppState::new(
        authorizer,
        Arc::new(SpotifyStoreFactory::default()),
    ));

    let app = router(app_state.clone(), &redirect_uri)?;

    // Drop stale sessions in the background
    let _cleanup = spawn_session_cleanup(app_state.sessions.clone());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .wrap_err_with(|| eyre!("Failed to bind to port {}", port))?;
    tracing::info!(
        "Listening on port {}, Spotify redirect uri is {}",
        port,
        redirect_uri
    );
    axum::serve(listener, app)
        .await
        .wrap_err("Failed to start HTTP server")?;

    Ok(())
}
