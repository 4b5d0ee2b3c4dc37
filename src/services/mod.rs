//! Pipeline services: catalog access, matching, orchestration

pub mod apple;
pub mod catalog;
pub mod matcher;
pub mod orchestrator;
pub mod spotify;

pub use apple::AppleMusicClient;
pub use catalog::{build_search_query, CatalogClient, TrackListing};
pub use matcher::TrackMatcher;
pub use orchestrator::{start_transfer, TransferOrchestrator};
pub use spotify::{SpotifyAppTokenCache, SpotifyAuth, SpotifyClient};
