//! Capability contract for one external music catalog.
//!
//! Two concrete clients implement this (Spotify, Apple Music); the matcher
//! and orchestrator only ever talk through the trait, which is also what the
//! test suite mocks.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Playlist, Track};

/// A fully-paginated track enumeration.
///
/// `truncated` is set when a page fetch failed partway through: the caller
/// proceeds with the tracks gathered so far instead of aborting the playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackListing {
    pub tracks: Vec<Track>,
    pub truncated: bool,
}

impl TrackListing {
    pub fn complete(tracks: Vec<Track>) -> Self {
        TrackListing { tracks, truncated: false }
    }
}

/// Capability set for one external catalog.
///
/// All methods are suspension points bounded by the client's HTTP timeout.
/// Read methods retry transient failures internally; the two write methods
/// (`create_playlist`, `add_tracks`) issue exactly one API call per
/// invocation and leave failure policy to the caller.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Human-readable service name for logs
    fn service_name(&self) -> &'static str;

    /// Every playlist visible to the authenticated identity, fully paginated.
    async fn list_playlists(&self) -> Result<Vec<Playlist>>;

    /// Resolve an externally-supplied playlist reference (URL, URI or bare
    /// id) to playlist metadata, using an application-level credential where
    /// the service supports anonymous reads.
    async fn resolve_playlist_reference(&self, reference: &str) -> Result<Playlist>;

    /// Complete ordered track sequence for a playlist, following pagination
    /// cursors until exhausted. Never fails outright: a failed page yields
    /// the tracks gathered so far with `truncated` set.
    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<TrackListing>;

    /// Up to `limit` candidates in the service's own relevance order.
    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>>;

    /// Best candidate for an ISRC, or none.
    async fn lookup_by_isrc(&self, isrc: &str) -> Result<Option<Track>>;

    /// Create an empty private playlist; returns its new identifier.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    /// Append one batch of track ids (at most the service's per-call
    /// ceiling; the orchestrator chunks) in the given order.
    async fn add_tracks(&self, playlist_id: &str, ids: &[String]) -> Result<()>;
}

/// Free-text fallback query: title + primary artist + album, absent fields
/// omitted.
pub fn build_search_query(track: &Track) -> String {
    let mut parts = vec![track.title.as_str()];
    if let Some(artist) = track.primary_artist() {
        parts.push(artist);
    }
    if let Some(album) = track.album.as_deref() {
        parts.push(album);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artists: &[&str], album: Option<&str>) -> Track {
        Track {
            id: "t".into(),
            title: title.into(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: album.map(String::from),
            isrc: None,
            duration_ms: None,
            explicit: None,
        }
    }

    #[test]
    fn query_joins_present_fields() {
        let t = track("Halo", &["Beyoncé"], Some("I Am... Sasha Fierce"));
        assert_eq!(build_search_query(&t), "Halo Beyoncé I Am... Sasha Fierce");
    }

    #[test]
    fn query_omits_absent_fields() {
        assert_eq!(build_search_query(&track("Halo", &[], None)), "Halo");
        assert_eq!(build_search_query(&track("Halo", &["Beyoncé"], None)), "Halo Beyoncé");
    }
}
