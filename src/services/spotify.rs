//! Spotify Web API client.
//!
//! Implements the catalog capability set against api.spotify.com. Reads can
//! run under either a user bearer token or an application-level
//! client-credentials token (public playlist transfers without a logged-in
//! source user); writes always need the user token.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

use crate::error::{Error, Result};
use crate::models::{CatalogSide, Playlist, Track};
use crate::services::catalog::{CatalogClient, TrackListing};
use crate::utils::rate_limit::RateLimiter;
use crate::utils::urlencode;
use crate::utils::retry::retry_transient;

const API_BASE: &str = "https://api.spotify.com/v1";
const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const HTTP_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_MS: u64 = 200;
/// Page size the playlist endpoints accept
const PAGE_LIMIT: usize = 50;
/// Seconds before expiry at which a cached app token is refreshed
const TOKEN_EXPIRY_SLACK_SECS: i64 = 30;

static URI_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"spotify:playlist:([A-Za-z0-9]+)").unwrap());
static URL_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"open\.spotify\.com/playlist/([A-Za-z0-9]+)").unwrap());
static BARE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// Process-wide cache for the client-credentials token used for anonymous
/// public reads.
///
/// The mutex is held across the refresh call, so concurrent expirations
/// coalesce into one in-flight token request.
pub struct SpotifyAppTokenCache {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + ChronoDuration::seconds(TOKEN_EXPIRY_SLACK_SECS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl SpotifyAppTokenCache {
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        Ok(SpotifyAppTokenCache {
            http: build_http_client()?,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        })
    }

    /// Current app token, refreshing if it expires within the slack window.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("Refreshing Spotify app token");
        let refreshed = retry_transient("spotify app token", || self.request_token()).await?;
        let token = refreshed.token.clone();
        *cached = Some(refreshed);
        Ok(token)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let response = self
            .http
            .post(ACCOUNTS_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status: status.as_u16(), message });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
        })
    }
}

/// Which credential a [`SpotifyClient`] presents.
#[derive(Clone)]
pub enum SpotifyAuth {
    /// Per-user bearer token from the linked account
    User(String),
    /// Shared application-level token for public reads
    App(Arc<SpotifyAppTokenCache>),
}

impl SpotifyAuth {
    async fn bearer(&self) -> Result<String> {
        match self {
            SpotifyAuth::User(token) => Ok(token.clone()),
            SpotifyAuth::App(cache) => cache.token().await,
        }
    }
}

/// Spotify catalog client.
pub struct SpotifyClient {
    http: reqwest::Client,
    auth: SpotifyAuth,
    rate_limiter: RateLimiter,
    /// Current user id, needed once to create playlists; fetched lazily
    user_id: OnceCell<String>,
}

impl SpotifyClient {
    pub fn new(auth: SpotifyAuth) -> Result<Self> {
        Ok(SpotifyClient {
            http: build_http_client()?,
            auth,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
            user_id: OnceCell::new(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        retry_transient("spotify GET", || self.get_json_once(url)).await
    }

    async fn get_json_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.wait().await;
        let bearer = self.auth.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&bearer)
            .send()
            .await
            .map_err(Error::from_reqwest)?;
        read_json(response).await
    }

    /// Single-attempt POST; write failure policy belongs to the caller.
    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.rate_limiter.wait().await;
        let bearer = self.auth.bearer().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&bearer)
            .json(body)
            .send()
            .await
            .map_err(Error::from_reqwest)?;
        read_json(response).await
    }

    async fn current_user_id(&self) -> Result<&str> {
        self.user_id
            .get_or_try_init(|| async {
                let me: CurrentUser = self.get_json(&format!("{API_BASE}/me")).await?;
                Ok(me.id)
            })
            .await
            .map(String::as_str)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(Error::RateLimited);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Api { status: status.as_u16(), message });
    }
    response.json().await.map_err(|e| Error::Parse(e.to_string()))
}

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::Network(e.to_string()))
}

/// Extract a playlist id from a share URL, a `spotify:playlist:` URI or a
/// bare id.
pub fn parse_playlist_reference(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(captures) = URI_REFERENCE.captures(input) {
        return Some(captures[1].to_string());
    }
    if let Some(captures) = URL_REFERENCE.captures(input) {
        return Some(captures[1].to_string());
    }
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Wire shapes
//
// Loosely-typed service JSON is converted to the internal model right here;
// nothing beyond this module sees Spotify's field names.
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CurrentUser {
    id: String,
}

#[derive(Deserialize)]
struct PlaylistPage {
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    id: String,
    name: String,
    description: Option<String>,
    tracks: Option<PlaylistTracksRef>,
}

#[derive(Deserialize)]
struct PlaylistTracksRef {
    total: Option<usize>,
}

#[derive(Deserialize)]
struct PlaylistTrackPage {
    items: Vec<PlaylistTrackItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistTrackItem {
    // Null for removed or local-only entries
    track: Option<TrackItem>,
}

#[derive(Deserialize)]
struct TrackItem {
    // Null for local files
    id: Option<String>,
    name: String,
    artists: Option<Vec<ArtistItem>>,
    album: Option<AlbumItem>,
    external_ids: Option<ExternalIds>,
    duration_ms: Option<u64>,
    explicit: Option<bool>,
}

#[derive(Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Deserialize)]
struct AlbumItem {
    name: String,
}

#[derive(Deserialize)]
struct ExternalIds {
    isrc: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Deserialize)]
struct SearchTracks {
    items: Vec<TrackItem>,
}

#[derive(Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    description: &'a str,
    public: bool,
}

#[derive(Serialize)]
struct AddTracksBody {
    uris: Vec<String>,
}

// Ignored; the add-tracks response only carries a snapshot id.
#[derive(Deserialize)]
struct SnapshotResponse {
    #[serde(rename = "snapshot_id")]
    _snapshot_id: Option<String>,
}

fn playlist_from_item(item: PlaylistItem) -> Playlist {
    Playlist {
        id: item.id,
        name: item.name,
        description: item.description.unwrap_or_default(),
        track_count: item.tracks.and_then(|t| t.total).unwrap_or(0),
        side: CatalogSide::Source,
    }
}

fn track_from_item(item: TrackItem) -> Option<Track> {
    let id = item.id?;
    Some(Track {
        id,
        title: item.name,
        artists: item
            .artists
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.name)
            .collect(),
        album: item.album.map(|a| a.name),
        isrc: item.external_ids.and_then(|e| e.isrc),
        duration_ms: item.duration_ms,
        explicit: item.explicit,
    })
}

/// Tracks plus the follow-up cursor for one page of a playlist.
fn tracks_from_page(page: PlaylistTrackPage) -> (Vec<Track>, Option<String>) {
    let tracks = page
        .items
        .into_iter()
        .filter_map(|item| item.track.and_then(track_from_item))
        .collect();
    (tracks, page.next)
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    fn service_name(&self) -> &'static str {
        "spotify"
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut url = format!("{API_BASE}/me/playlists?limit={PAGE_LIMIT}");

        loop {
            let page: PlaylistPage = self.get_json(&url).await?;
            playlists.extend(page.items.into_iter().map(playlist_from_item));
            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        tracing::debug!(count = playlists.len(), "Listed Spotify playlists");
        Ok(playlists)
    }

    async fn resolve_playlist_reference(&self, reference: &str) -> Result<Playlist> {
        let id = parse_playlist_reference(reference)
            .ok_or_else(|| Error::InvalidSelection(format!("not a Spotify playlist reference: {reference}")))?;
        let item: PlaylistItem = self
            .get_json(&format!("{API_BASE}/playlists/{id}"))
            .await
            .map_err(|e| match e {
                Error::Api { status: 404, .. } => {
                    Error::InvalidSelection("playlist not found or not public".into())
                }
                other => other,
            })?;
        Ok(playlist_from_item(item))
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<TrackListing> {
        let mut tracks: Vec<Track> = Vec::new();
        let mut url = format!("{API_BASE}/playlists/{playlist_id}/tracks?limit={PAGE_LIMIT}");

        loop {
            match self.get_json::<PlaylistTrackPage>(&url).await {
                Ok(page) => {
                    let (mut page_tracks, next) = tracks_from_page(page);
                    tracks.append(&mut page_tracks);
                    match next {
                        Some(next_url) => url = next_url,
                        None => return Ok(TrackListing::complete(tracks)),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        playlist_id,
                        gathered = tracks.len(),
                        error = %e,
                        "Page fetch failed, returning truncated listing"
                    );
                    return Ok(TrackListing { tracks, truncated: true });
                }
            }
        }
    }

    async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let url = format!(
            "{API_BASE}/search?type=track&limit={limit}&q={}",
            urlencode(query)
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response
            .tracks
            .items
            .into_iter()
            .filter_map(track_from_item)
            .collect())
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        let url = format!(
            "{API_BASE}/search?type=track&limit=1&q={}",
            urlencode(&format!("isrc:{isrc}"))
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.tracks.items.into_iter().find_map(track_from_item))
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let user_id = self.current_user_id().await?;
        let body = CreatePlaylistBody { name, description, public: false };
        let created: CreatedPlaylist = self
            .post_json(&format!("{API_BASE}/users/{user_id}/playlists"), &body)
            .await?;
        tracing::info!(playlist_id = %created.id, name, "Created Spotify playlist");
        Ok(created.id)
    }

    async fn add_tracks(&self, playlist_id: &str, ids: &[String]) -> Result<()> {
        let body = AddTracksBody {
            uris: ids.iter().map(|id| format!("spotify:track:{id}")).collect(),
        };
        let _: SnapshotResponse = self
            .post_json(&format!("{API_BASE}/playlists/{playlist_id}/tracks"), &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_reference_forms() {
        assert_eq!(
            parse_playlist_reference("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=x"),
            Some("37i9dQZF1DXcBWIGoYBM5M".into())
        );
        assert_eq!(
            parse_playlist_reference("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"),
            Some("37i9dQZF1DXcBWIGoYBM5M".into())
        );
        assert_eq!(
            parse_playlist_reference("37i9dQZF1DXcBWIGoYBM5M"),
            Some("37i9dQZF1DXcBWIGoYBM5M".into())
        );
        assert_eq!(parse_playlist_reference("https://example.com/nope"), None);
        assert_eq!(parse_playlist_reference("not a reference"), None);
    }

    fn page_json(start: usize, count: usize, next: Option<&str>) -> serde_json::Value {
        let items: Vec<_> = (start..start + count)
            .map(|i| {
                json!({
                    "track": {
                        "id": format!("t{i}"),
                        "name": format!("Track {i}"),
                        "artists": [{"name": "Artist"}],
                        "album": {"name": "Album"},
                        "external_ids": {"isrc": format!("USX{i:08}")},
                        "duration_ms": 200_000,
                        "explicit": false
                    }
                })
            })
            .collect();
        json!({ "items": items, "next": next, "total": 117 })
    }

    #[test]
    fn three_pages_concatenate_in_order() {
        let pages = [
            page_json(0, 50, Some("page2")),
            page_json(50, 50, Some("page3")),
            page_json(100, 17, None),
        ];

        let mut tracks = Vec::new();
        for page in pages {
            let parsed: PlaylistTrackPage = serde_json::from_value(page).unwrap();
            let (mut page_tracks, _next) = tracks_from_page(parsed);
            tracks.append(&mut page_tracks);
        }

        assert_eq!(tracks.len(), 117);
        for (i, track) in tracks.iter().enumerate() {
            assert_eq!(track.id, format!("t{i}"), "reordered at index {i}");
        }
    }

    #[test]
    fn null_and_local_tracks_are_skipped() {
        let page = json!({
            "items": [
                { "track": null },
                { "track": { "id": null, "name": "Local File" } },
                { "track": { "id": "t1", "name": "Kept" } }
            ],
            "next": null
        });
        let parsed: PlaylistTrackPage = serde_json::from_value(page).unwrap();
        let (tracks, next) = tracks_from_page(parsed);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t1");
        assert!(next.is_none());
    }

    #[test]
    fn playlist_item_maps_defaults() {
        let item: PlaylistItem = serde_json::from_value(json!({
            "id": "p1",
            "name": "Mix",
            "description": null,
            "tracks": {"total": 42}
        }))
        .unwrap();
        let playlist = playlist_from_item(item);
        assert_eq!(playlist.description, "");
        assert_eq!(playlist.track_count, 42);
    }

    #[test]
    fn cached_token_freshness_window() {
        let now = Utc::now();
        let fresh = CachedToken { token: "t".into(), expires_at: now + ChronoDuration::seconds(3600) };
        assert!(fresh.is_fresh(now));

        let expiring = CachedToken { token: "t".into(), expires_at: now + ChronoDuration::seconds(10) };
        assert!(!expiring.is_fresh(now));
    }
}
