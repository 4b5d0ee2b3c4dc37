//! Domain types shared across the transfer pipeline

mod matching;
mod session;
mod track;

pub use matching::{MatchResult, MatchStatus, MatchThresholds};
pub use session::{Direction, PlaylistSelection, TransferRequest};
pub use track::{CatalogSide, Playlist, Track};
