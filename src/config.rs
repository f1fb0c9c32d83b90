use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, OptionExt, Result, eyre};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::spotify::client::SpotifyApiCredentials;

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/callback";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    spotify: SpotifyConfig,
    #[serde(default)]
    telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. http://localhost:4317
    pub otlp_endpoint: Option<String>,
}

/// Values supplied on the command line or through the environment. They win
/// over the config file.
#[derive(Debug, Clone, Default)]
pub struct SpotifyOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("playlist-sync").join("config.toml"))
    }

    /// Load the default config file, falling back to an empty config when it doesn't exist
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Write an empty config file to `path`, refusing to overwrite an existing one
    pub fn create_default_at(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(eyre!("Config file already exists: {}", path.display()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create config directory: {}", parent.display()))?;
        }

        let config = Config {
            spotify: SpotifyConfig {
                client_id: Some(String::new()),
                client_secret: Some(String::new()),
                redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            },
            telemetry: TelemetryConfig::default(),
        };
        let contents = toml::to_string_pretty(&config).wrap_err("Failed to serialize config")?;
        std::fs::write(path, contents)
            .wrap_err(format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Create a default config file, if it doesn't exist
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory found")?;
        Self::create_default_at(&path)?;
        Ok(path)
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.telemetry.otlp_endpoint.as_deref()
    }

    /// Resolve the Spotify app credentials. Overrides win, empty values count as missing.
    pub fn spotify_credentials(&self, overrides: &SpotifyOverrides) -> Result<SpotifyApiCredentials> {
        fn pick(first: &Option<String>, second: &Option<String>) -> Option<String> {
            first
                .iter()
                .chain(second.iter())
                .find(|value| !value.trim().is_empty())
                .cloned()
        }

        let client_id = pick(&overrides.client_id, &self.spotify.client_id)
            .ok_or_eyre("Spotify client id is missing. Set SPOTIFY_CLIENT_ID or spotify.client_id")?;
        let client_secret = pick(&overrides.client_secret, &self.spotify.client_secret)
            .ok_or_eyre(
                "Spotify client secret is missing. Set SPOTIFY_CLIENT_SECRET or spotify.client_secret",
            )?;
        let redirect_uri = pick(&overrides.redirect_uri, &self.spotify.redirect_uri)
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let redirect_uri = Url::parse(&redirect_uri)
            .wrap_err(format!("Invalid Spotify redirect uri: {}", redirect_uri))?;

        Ok(SpotifyApiCredentials::new(
            client_id,
            client_secret,
            redirect_uri,
        ))
    }
}
