//! playlift - playlist transfer between Spotify and Apple Music
//!
//! Runs one transfer session from the command line and prints every
//! progress event as a single JSON line, the same shape a streaming
//! consumer would receive.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use playlift::config::Config;
use playlift::error::Error;
use playlift::models::{Direction, PlaylistSelection, TransferRequest};
use playlift::services::{
    AppleMusicClient, CatalogClient, SpotifyAppTokenCache, SpotifyAuth, SpotifyClient,
};
use playlift::{start_transfer, TransferEvent};

#[derive(Parser)]
#[command(name = "playlift", version, about = "Transfer playlists between Spotify and Apple Music")]
struct Args {
    /// Transfer direction
    #[arg(long, value_enum)]
    direction: CliDirection,

    /// Transfer every playlist visible to the source account
    #[arg(long, conflicts_with_all = ["playlist_ids", "playlist_url"])]
    all: bool,

    /// Comma-separated source playlist ids
    #[arg(long, value_delimiter = ',', conflicts_with = "playlist_url")]
    playlist_ids: Vec<String>,

    /// A single public playlist reference (share URL, URI or bare id)
    #[arg(long)]
    playlist_url: Option<String>,

    /// Path to the config file (default: ~/.config/playlift/config.toml)
    #[arg(long, env = "PLAYLIFT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliDirection {
    SpotifyToApple,
    AppleToSpotify,
}

impl From<CliDirection> for Direction {
    fn from(value: CliDirection) -> Direction {
        match value {
            CliDirection::SpotifyToApple => Direction::SpotifyToApple,
            CliDirection::AppleToSpotify => Direction::AppleToSpotify,
        }
    }
}

impl Args {
    fn selection(&self) -> playlift::Result<PlaylistSelection> {
        if let Some(reference) = &self.playlist_url {
            return Ok(PlaylistSelection::ExternalReference(reference.clone()));
        }
        if !self.playlist_ids.is_empty() {
            return Ok(PlaylistSelection::Ids(self.playlist_ids.clone()));
        }
        if self.all {
            return Ok(PlaylistSelection::All);
        }
        Err(Error::InvalidSelection(
            "one of --all, --playlist-ids or --playlist-url is required".into(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let direction = Direction::from(args.direction);

    // Precondition failures are reported in the same shape as session
    // failures: one terminal error event on stdout.
    let (config, selection) = match setup(&args) {
        Ok(ready) => ready,
        Err(e) => return emit_fatal(&e),
    };
    let request = TransferRequest { direction, selection: selection.clone() };
    let (source, destination) = match build_clients(&config, direction, &selection) {
        Ok(clients) => clients,
        Err(e) => return emit_fatal(&e),
    };
    info!(
        source = source.service_name(),
        destination = destination.service_name(),
        "Starting transfer"
    );

    let mut stream = start_transfer(source, destination, request, config.thresholds_for(direction));
    let mut failed = false;
    while let Some(event) = stream.next().await {
        if matches!(event, TransferEvent::Error { .. }) {
            failed = true;
        }
        println!("{}", serde_json::to_string(&event)?);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn setup(args: &Args) -> playlift::Result<(Config, PlaylistSelection)> {
    let config = Config::load(args.config.as_deref())?;
    let selection = args.selection()?;
    Ok((config, selection))
}

fn emit_fatal(error: &Error) -> Result<()> {
    println!("{}", serde_json::to_string(&TransferEvent::fatal(error))?);
    std::process::exit(1);
}

fn build_clients(
    config: &Config,
    direction: Direction,
    selection: &PlaylistSelection,
) -> playlift::Result<(Arc<dyn CatalogClient>, Arc<dyn CatalogClient>)> {
    let spotify_auth = spotify_auth(config, direction, selection)?;
    let spotify: Arc<dyn CatalogClient> = Arc::new(SpotifyClient::new(spotify_auth)?);
    let apple: Arc<dyn CatalogClient> = Arc::new(AppleMusicClient::new(
        require(&config.apple.developer_token, "apple.developer_token")?,
        require(&config.apple.music_user_token, "apple.music_user_token")?,
        config.apple_storefront().to_string(),
    )?);

    Ok(match direction {
        Direction::SpotifyToApple => (spotify, apple),
        Direction::AppleToSpotify => (apple, spotify),
    })
}

/// Pick the Spotify credential for this run. An external public-playlist
/// reference reads anonymously under client credentials; every other mode
/// (and any run writing to Spotify) needs the user token.
fn spotify_auth(
    config: &Config,
    direction: Direction,
    selection: &PlaylistSelection,
) -> playlift::Result<SpotifyAuth> {
    let anonymous_read = direction == Direction::SpotifyToApple
        && matches!(selection, PlaylistSelection::ExternalReference(_));

    if anonymous_read {
        let cache = SpotifyAppTokenCache::new(
            require(&config.spotify.client_id, "spotify.client_id")?,
            require(&config.spotify.client_secret, "spotify.client_secret")?,
        )?;
        Ok(SpotifyAuth::App(Arc::new(cache)))
    } else {
        Ok(SpotifyAuth::User(require(
            &config.spotify.access_token,
            "spotify.access_token",
        )?))
    }
}

fn require(field: &Option<String>, name: &str) -> playlift::Result<String> {
    field
        .clone()
        .ok_or_else(|| Error::MissingCredential(name.to_string()))
}
