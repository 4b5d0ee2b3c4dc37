//! # Playlift
//!
//! Transfers playlists between Spotify and Apple Music:
//! - Catalog clients for both services behind one capability trait
//! - ISRC-first track matching with a scored free-text fallback
//! - A transfer orchestrator narrating progress over an ordered event stream
//! - Text normalization shared by matching on both sides

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod normalize;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{ProgressSink, TransferEvent};
pub use models::{
    Direction, MatchResult, MatchStatus, MatchThresholds, Playlist, PlaylistSelection, Track,
    TransferRequest,
};
pub use services::{start_transfer, CatalogClient, TransferOrchestrator};
