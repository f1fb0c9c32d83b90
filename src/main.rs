mod config;
mod http_server;
mod logging;
mod ports;
mod services;
mod spotify_rs;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::{Config, SpotifyOverrides},
    http_server::app::HttpServerConfig,
    logging::init_tracing,
    ports::spotify::{PlaylistStore, TokenEndpoint},
    services::{
        auth::{SessionAuthorizer, parse_authorization_response},
        session::{Credential, SessionContext},
        spotify::{
            client::{
                SpotifyApiCredentials, SpotifyHttpAdapter, SpotifyStoreFactory, SpotifyTokenAdapter,
            },
            sync::{DEFAULT_SYNC_LIMIT, sync_playlists},
        },
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `playlist_sync=debug` (default: warn)
    #[arg(long, default_value = "warn", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Spotify app client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect uri registered for the Spotify app
    #[arg(long, env = "SPOTIFY_REDIRECT_URI", global = true)]
    redirect_uri: Option<String>,

    /// OTLP collector to export traces to
    #[arg(long, env = "OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the web app and GraphQL api
    Serve {
        /// The port to run the server on
        #[arg(short, long, default_value = "3000", env = "PLAYLIST_SYNC_HTTP_PORT")]
        port: u16,
    },
    /// Log in and sync the newest tracks of one playlist into another
    Sync {
        /// Id of the playlist to copy tracks from
        #[arg(short, long)]
        source: String,

        /// Id of the playlist to copy tracks into
        #[arg(short, long)]
        target: String,

        /// How many of the newest source tracks to keep in the target (1 to 100)
        #[arg(short = 'n', long, default_value_t = DEFAULT_SYNC_LIMIT)]
        count: u32,
    },
    /// Log in and list your playlists with their ids
    Playlists,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

/// Walk the user through the consent page and return a fresh credential.
async fn interactive_login(credentials: &SpotifyApiCredentials) -> Result<Credential> {
    let tokens: Arc<dyn TokenEndpoint> = Arc::new(SpotifyTokenAdapter::new(credentials.clone()));
    let authorizer = SessionAuthorizer::new(
        credentials.client_id().to_string(),
        credentials.redirect_uri().clone(),
        tokens,
    );
    let mut session = SessionContext::new();

    let url = authorizer.begin_authorization(&mut session);
    println!("Open this url in your browser and log in to Spotify:\n\n{}\n", url);
    println!("Then paste the url you were redirected to:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .wrap_err("Failed to read the redirect url")?;

    let response = parse_authorization_response(&line)?;
    let credential = authorizer
        .exchange_code(&mut session, &response.code, response.state.as_deref())
        .await?;

    let profile = SpotifyHttpAdapter::new(&credential)
        .get_current_user_profile()
        .await
        .wrap_err("Failed to fetch Spotify profile")?;
    println!(
        "Logged in as {}",
        profile.display_name.as_deref().unwrap_or(&profile.id)
    );

    Ok(credential)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config = match &args.config {
        // `config create-default` may point at a file that does not exist yet
        Some(path) if !path.exists() && matches!(args.command, Commands::Config(_)) => {
            Ok(Config::default())
        }
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .with_context(|| "Failed to load playlist-sync config")?;

    let otlp_endpoint = args
        .otlp_endpoint
        .as_deref()
        .or_else(|| config.otlp_endpoint());
    let tracer_provider = init_tracing(env!("CARGO_PKG_NAME"), otlp_endpoint, &args.log_level)?;
    tracing::debug!("Playlist sync starting");

    let overrides = SpotifyOverrides {
        client_id: args.client_id,
        client_secret: args.client_secret,
        redirect_uri: args.redirect_uri,
    };

    match args.command {
        Commands::Serve { port } => {
            let credentials = config.spotify_credentials(&overrides)?;
            tracing::info!("Starting HTTP server on port: {}", port);
            http_server::app::start(HttpServerConfig { port, credentials }).await?;
        }
        Commands::Sync {
            source,
            target,
            count,
        } => {
            let credentials = config.spotify_credentials(&overrides)?;
            let credential = interactive_login(&credentials).await?;

            let result = sync_playlists(
                &SpotifyStoreFactory::default(),
                &credential,
                &source,
                &target,
                count,
            )
            .await?;
            println!("{}", result.message());
            if result.removed > 0 {
                println!("{} old tracks removed from target playlist.", result.removed);
            }
        }
        Commands::Playlists => {
            let credentials = config.spotify_credentials(&overrides)?;
            let credential = interactive_login(&credentials).await?;

            let playlists = SpotifyHttpAdapter::new(&credential)
                .list_user_playlists()
                .await
                .wrap_err("Failed to list playlists")?;
            for playlist in playlists {
                println!(
                    "{}\t{}\t{} tracks\t{}",
                    playlist.id,
                    playlist.name,
                    playlist.total_tracks,
                    playlist.owner.unwrap_or_default()
                );
            }
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = match &args.config {
                    Some(path) => {
                        Config::create_default_at(path)?;
                        path.clone()
                    }
                    None => Config::create_default()?,
                };
                println!("Created config at {}", path.display());
            }
            ConfigCommands::Path => match args.config.or_else(Config::config_path) {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    if let Some(tracer_provider) = tracer_provider {
        tracer_provider
            .shutdown()
            .wrap_err("Failed to shut down tracer provider")?;
    }

    Ok(())
}
