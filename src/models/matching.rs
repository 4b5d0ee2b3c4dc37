//! Match verdict and threshold types

use serde::{Deserialize, Serialize};

use super::Direction;

/// Verdict for one source track against the destination catalog.
///
/// Confidence is a heuristic value in [0,1], not a probability; it is
/// present exactly when a destination candidate was selected.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// Confident match; safe to carry over without review
    Matched { target_id: String, confidence: f64 },
    /// Best candidate cleared the lower band only; carried over but flagged
    LowConfidence { target_id: String, confidence: f64 },
    /// No usable candidate
    Unmatched { reason: String },
}

impl MatchResult {
    pub fn status(&self) -> MatchStatus {
        match self {
            MatchResult::Matched { .. } => MatchStatus::Matched,
            MatchResult::LowConfidence { .. } => MatchStatus::LowConfidence,
            MatchResult::Unmatched { .. } => MatchStatus::Unmatched,
        }
    }

    /// Destination track id, when one was selected.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { target_id, .. }
            | MatchResult::LowConfidence { target_id, .. } => Some(target_id),
            MatchResult::Unmatched { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            MatchResult::Matched { confidence, .. }
            | MatchResult::LowConfidence { confidence, .. } => Some(*confidence),
            MatchResult::Unmatched { .. } => None,
        }
    }
}

/// Discriminant of [`MatchResult`], as carried on the event wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Matched,
    LowConfidence,
    Unmatched,
}

/// Score bands separating matched / low-confidence / unmatched verdicts.
///
/// The two directions ship different lower bands (observed behavior of the
/// services' search quality differs); both are named constants and can be
/// overridden from configuration rather than being hard-coded in the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Scores at or above this are `Matched`
    pub matched: f64,
    /// Scores at or above this (but below `matched`) are `LowConfidence`
    pub low_confidence: f64,
}

impl MatchThresholds {
    /// Defaults when the destination catalog is Apple Music
    pub const TOWARD_APPLE: MatchThresholds = MatchThresholds {
        matched: 0.75,
        low_confidence: 0.5,
    };

    /// Defaults when the destination catalog is Spotify
    pub const TOWARD_SPOTIFY: MatchThresholds = MatchThresholds {
        matched: 0.75,
        low_confidence: 0.6,
    };

    pub fn for_direction(direction: Direction) -> MatchThresholds {
        match direction {
            Direction::SpotifyToApple => Self::TOWARD_APPLE,
            Direction::AppleToSpotify => Self::TOWARD_SPOTIFY,
        }
    }
}
