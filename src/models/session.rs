//! Per-session request types
//!
//! A transfer request is ephemeral: it exists for exactly one orchestrator
//! run and is dropped when the event stream closes. Nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Which way the transfer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    SpotifyToApple,
    AppleToSpotify,
}

/// Which source playlists the session covers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistSelection {
    /// Every playlist visible to the authenticated source-side identity
    All,
    /// An explicit id list, filtered against the visible playlists
    Ids(Vec<String>),
    /// A single externally-supplied playlist reference (URL, URI or bare id),
    /// resolved with an application-level credential so the source-side user
    /// does not have to be authenticated
    ExternalReference(String),
}

/// Everything the orchestrator needs to run one session.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub direction: Direction,
    pub selection: PlaylistSelection,
}
