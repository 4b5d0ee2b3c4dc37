//! Apple Music API client.
//!
//! Library endpoints (playlists, their tracks, playlist creation) run under
//! the developer token plus the Music-User-Token header; catalog endpoints
//! (search, ISRC filter) are scoped to the user's storefront.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{CatalogSide, Playlist, Track};
use crate::services::catalog::{CatalogClient, TrackListing};
use crate::utils::rate_limit::RateLimiter;
use crate::utils::urlencode;
use crate::utils::retry::retry_transient;

const API_ORIGIN: &str = "https://api.music.apple.com";
const HTTP_TIMEOUT_SECS: u64 = 30;
const RATE_LIMIT_MS: u64 = 500;
/// Page size the library tracks endpoint accepts
const LIBRARY_PAGE_LIMIT: usize = 100;
const MUSIC_USER_TOKEN_HEADER: &str = "Music-User-Token";

/// Apple Music catalog client.
pub struct AppleMusicClient {
    http: reqwest::Client,
    developer_token: String,
    music_user_token: String,
    storefront: String,
    rate_limiter: RateLimiter,
}

impl AppleMusicClient {
    pub fn new(developer_token: String, music_user_token: String, storefront: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(AppleMusicClient {
            http,
            developer_token,
            music_user_token,
            storefront,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        retry_transient("apple GET", || self.get_json_once(url)).await
    }

    async fn get_json_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.wait().await;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.developer_token)
            .header(MUSIC_USER_TOKEN_HEADER, &self.music_user_token)
            .send()
            .await
            .map_err(Error::from_reqwest)?;
        read_json(response).await
    }

    /// Single-attempt POST; write failure policy belongs to the caller.
    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        self.rate_limiter.wait().await;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.developer_token)
            .header(MUSIC_USER_TOKEN_HEADER, &self.music_user_token)
            .json(body)
            .send()
            .await
            .map_err(Error::from_reqwest)?;
        read_json(response).await
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

/// Pagination `next` values come back as origin-relative paths.
fn absolute_url(next: &str) -> String {
    if next.starts_with("http") {
        next.to_string()
    } else {
        format!("{API_ORIGIN}{next}")
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ResourcePage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct LibraryPlaylistResource {
    id: String,
    attributes: Option<LibraryPlaylistAttributes>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryPlaylistAttributes {
    name: Option<String>,
    description: Option<PlaylistDescription>,
}

#[derive(Deserialize)]
struct PlaylistDescription {
    standard: Option<String>,
}

#[derive(Deserialize)]
struct SongResource {
    id: String,
    attributes: Option<SongAttributes>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SongAttributes {
    name: Option<String>,
    artist_name: Option<String>,
    album_name: Option<String>,
    isrc: Option<String>,
    duration_in_millis: Option<u64>,
    content_rating: Option<String>,
    play_params: Option<PlayParams>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayParams {
    isrc: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Deserialize, Default)]
struct SearchResults {
    songs: Option<SongPage>,
}

#[derive(Deserialize)]
struct SongPage {
    data: Vec<SongResource>,
}

#[derive(Serialize)]
struct CreatePlaylistBody<'a> {
    attributes: CreatePlaylistAttributes<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlaylistAttributes<'a> {
    name: &'a str,
    description: &'a str,
    is_public: bool,
}

#[derive(Serialize)]
struct AddTracksBody {
    data: Vec<TrackRef>,
}

#[derive(Serialize)]
struct TrackRef {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

fn playlist_from_resource(resource: LibraryPlaylistResource) -> Playlist {
    let attributes = resource.attributes.unwrap_or(LibraryPlaylistAttributes {
        name: None,
        description: None,
    });
    Playlist {
        id: resource.id,
        name: attributes.name.unwrap_or_default(),
        description: attributes
            .description
            .and_then(|d| d.standard)
            .unwrap_or_default(),
        // The library playlist listing does not report counts; refined when
        // tracks are paginated.
        track_count: 0,
        side: CatalogSide::Source,
    }
}

fn track_from_resource(resource: SongResource) -> Track {
    let attributes = resource.attributes.unwrap_or_default();
    // Library entries sometimes lack a direct isrc but carry it in playParams.
    let isrc = attributes
        .isrc
        .or_else(|| attributes.play_params.and_then(|p| p.isrc));
    Track {
        id: resource.id,
        title: attributes.name.unwrap_or_default(),
        artists: attributes.artist_name.into_iter().collect(),
        album: attributes.album_name,
        isrc,
        duration_ms: attributes.duration_in_millis,
        explicit: attributes.content_rating.map(|r| r == "explicit"),
    }
}

#[async_trait]
impl CatalogClient for AppleMusicClient {
    fn service_name(&self) -> &'static str {
        "apple-music"
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut url = format!("{API_ORIGIN}/v1/me/library/playlists");

        loop {
            let page: ResourcePage<LibraryPlaylistResource> = self.get_json(&url).await?;
            playlists.extend(page.data.into_iter().map(playlist_from_resource));
            match page.next {
                Some(next) => url = absolute_url(&next),
                None => break,
            }
        }

        tracing::debug!(count = playlists.len(), "Listed Apple Music library playlists");
        Ok(playlists)
    }

    async fn resolve_playlist_reference(&self, _reference: &str) -> Result<Playlist> {
        // Anonymous single-playlist transfers are only offered from the
        // Spotify side; the Apple library has no public share references.
        Err(Error::InvalidSelection(
            "external playlist references are not supported for Apple Music sources".into(),
        ))
    }

    async fn list_playlist_tracks(&self, playlist_id: &str) -> Result<TrackListing> {
        let mut tracks: Vec<Track> = Vec::new();
        let mut url = format!(
            "{API_ORIGIN}/v1/me/library/playlists/{playlist_id}/tracks?limit={LIBRARY_PAGE_LIMIT}"
        );

        loop {
            match self.get_json::<ResourcePage<SongResource>>(&url).await {
                Ok(page) => {
                    tracks.extend(page.data.into_iter().map(track_from_resource));
                    match page.next {
                        Some(next) => url = absolute_url(&next),
                        None => return Ok(TrackListing::complete(tracks)),
                    }
                }
                Err(Error::Api { status: 404, .. }) => {
                    // An empty library playlist reports its track relationship
                    // as missing rather than as an empty page.
                    return Ok(TrackListing::complete(tracks));
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
            "{API_ORIGIN}/v1/catalog/{}/search?types=songs&limit={limit}&term={}",
            self.storefront,
            urlencode(query)
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response
            .results
            .songs
            .map(|songs| songs.data.into_iter().map(track_from_resource).collect())
            .unwrap_or_default())
    }

    async fn lookup_by_isrc(&self, isrc: &str) -> Result<Option<Track>> {
        let url = format!(
            "{API_ORIGIN}/v1/catalog/{}/songs?filter[isrc]={}",
            self.storefront,
            urlencode(isrc)
        );
        let page: ResourcePage<SongResource> = self.get_json(&url).await?;
        Ok(page.data.into_iter().next().map(track_from_resource))
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let body = CreatePlaylistBody {
            attributes: CreatePlaylistAttributes { name, description, is_public: false },
        };
        let created: ResourcePage<LibraryPlaylistResource> = self
            .post_json(&format!("{API_ORIGIN}/v1/me/library/playlists"), &body)
            .await?;
        let id = created
            .data
            .into_iter()
            .next()
            .map(|p| p.id)
            .ok_or_else(|| Error::Parse("create playlist response carried no resource".into()))?;
        tracing::info!(playlist_id = %id, name, "Created Apple Music library playlist");
        Ok(id)
    }

    async fn add_tracks(&self, playlist_id: &str, ids: &[String]) -> Result<()> {
        let body = AddTracksBody {
            data: ids
                .iter()
                .map(|id| TrackRef { id: id.clone(), kind: "songs" })
                .collect(),
        };
        self.rate_limiter.wait().await;
        let response = self
            .http
            .post(format!(
                "{API_ORIGIN}/v1/me/library/playlists/{playlist_id}/tracks"
            ))
            .bearer_auth(&self.developer_token)
            .header(MUSIC_USER_TOKEN_HEADER, &self.music_user_token)
            .json(&body)
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        // 204 No Content on success; no body to parse.
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status: status.as_u16(), message });
        }
        Ok(())
    }
}
