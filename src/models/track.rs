//! Read-only catalog projections
//!
//! Tracks and playlists are fetched fresh per session and never cached
//! across sessions. Conversion from each service's wire shape happens at
//! the catalog client edge; the rest of the pipeline only sees these types.

use serde::{Deserialize, Serialize};

/// Which role a playlist's owning catalog plays in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSide {
    Source,
    Destination,
}

/// One track as fetched from a catalog. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-scoped identifier
    pub id: String,
    pub title: String,
    /// Artist names in credit order; first entry is the primary artist
    pub artists: Vec<String>,
    pub album: Option<String>,
    /// International Standard Recording Code, when the catalog exposes it
    pub isrc: Option<String>,
    pub duration_ms: Option<u64>,
    pub explicit: Option<bool>,
}

impl Track {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// One playlist as enumerated from a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Service-reported count; an estimate until tracks are fully paginated
    pub track_count: usize,
    pub side: CatalogSide,
}
