//! Configuration loading.
//!
//! Credentials and optional threshold overrides come from a TOML file,
//! resolved in priority order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `PLAYLIFT_CONFIG` environment variable
//! 3. `~/.config/playlift/config.toml`
//!
//! Individual credentials can additionally be overridden by `PLAYLIFT_*`
//! environment variables, which win over the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{Direction, MatchThresholds};

/// Top-level configuration file shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub apple: AppleConfig,
    /// Optional per-direction threshold overrides
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyConfig {
    /// User bearer token for library reads and playlist writes
    pub access_token: Option<String>,
    /// Client-credentials pair for anonymous public-playlist reads
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppleConfig {
    pub developer_token: Option<String>,
    pub music_user_token: Option<String>,
    /// Catalog storefront for search, e.g. "us"
    pub storefront: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdsConfig {
    pub toward_apple: Option<MatchThresholds>,
    pub toward_spotify: Option<MatchThresholds>,
}

impl Config {
    /// Load configuration following the priority order above. A missing file
    /// is only an error when a path was explicitly given.
    pub fn load(cli_path: Option<&Path>) -> Result<Config> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) => {
                if !path.exists() {
                    if cli_path.is_some() || std::env::var("PLAYLIFT_CONFIG").is_ok() {
                        return Err(Error::Config(format!(
                            "config file not found: {}",
                            path.display()
                        )));
                    }
                    Config::default()
                } else {
                    Self::from_file(&path)?
                }
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    fn apply_env_overrides(&mut self) {
        override_from_env(&mut self.spotify.access_token, "PLAYLIFT_SPOTIFY_ACCESS_TOKEN");
        override_from_env(&mut self.spotify.client_id, "PLAYLIFT_SPOTIFY_CLIENT_ID");
        override_from_env(&mut self.spotify.client_secret, "PLAYLIFT_SPOTIFY_CLIENT_SECRET");
        override_from_env(&mut self.apple.developer_token, "PLAYLIFT_APPLE_DEVELOPER_TOKEN");
        override_from_env(&mut self.apple.music_user_token, "PLAYLIFT_APPLE_MUSIC_USER_TOKEN");
        override_from_env(&mut self.apple.storefront, "PLAYLIFT_APPLE_STOREFRONT");
    }

    /// Storefront with the compiled default applied.
    pub fn apple_storefront(&self) -> &str {
        self.apple.storefront.as_deref().unwrap_or("us")
    }

    /// Thresholds for a transfer toward Apple Music, with any file override.
    pub fn thresholds_toward_apple(&self) -> MatchThresholds {
        self.thresholds.toward_apple.unwrap_or(MatchThresholds::TOWARD_APPLE)
    }

    /// Thresholds for a transfer toward Spotify, with any file override.
    pub fn thresholds_toward_spotify(&self) -> MatchThresholds {
        self.thresholds.toward_spotify.unwrap_or(MatchThresholds::TOWARD_SPOTIFY)
    }

    /// Thresholds governing the given direction's destination matching.
    pub fn thresholds_for(&self, direction: Direction) -> MatchThresholds {
        match direction {
            Direction::SpotifyToApple => self.thresholds_toward_apple(),
            Direction::AppleToSpotify => self.thresholds_toward_spotify(),
        }
    }
}

fn override_from_env(field: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *field = Some(value);
        }
    }
}

fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("PLAYLIFT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("playlift").join("config.toml"))
}
