//! Cross-catalog track matching.
//!
//! ISRC is an authoritative join key: a hit short-circuits with confidence
//! 1.0 and no heuristic scoring. Otherwise the destination catalog is
//! searched free-text and candidates are scored on normalized title/artist
//! equality, duration proximity and variant/explicit penalties.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{MatchResult, MatchThresholds, Track};
use crate::normalize::normalize;
use crate::services::catalog::{build_search_query, CatalogClient};

/// Candidates fetched per free-text search.
const SEARCH_CANDIDATE_LIMIT: usize = 5;

// Variant markers that make a candidate a different recording when the
// source title carries none of them.
static VARIANT_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(live|karaoke|remix|instrumental)\b").unwrap());

/// Matches one source track at a time against a destination catalog.
pub struct TrackMatcher {
    thresholds: MatchThresholds,
}

impl TrackMatcher {
    pub fn new(thresholds: MatchThresholds) -> Self {
        TrackMatcher { thresholds }
    }

    /// Produce a verdict for `source` against `destination`.
    ///
    /// Read-only; a failed catalog call (after the client's retry budget)
    /// degrades that phase to "no result" rather than aborting the session.
    pub async fn match_track(&self, source: &Track, destination: &dyn CatalogClient) -> MatchResult {
        if let Some(isrc) = source.isrc.as_deref() {
            match destination.lookup_by_isrc(isrc).await {
                Ok(Some(hit)) => {
                    tracing::debug!(
                        track = %source.title,
                        isrc,
                        target_id = %hit.id,
                        "ISRC hit"
                    );
                    return MatchResult::Matched { target_id: hit.id, confidence: 1.0 };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(track = %source.title, isrc, error = %e, "ISRC lookup failed, falling back to search");
                }
            }
        }

        let query = build_search_query(source);
        let candidates = match destination.search_tracks(&query, SEARCH_CANDIDATE_LIMIT).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(track = %source.title, error = %e, "Search failed, treating as no candidates");
                Vec::new()
            }
        };

        let verdict = evaluate(source, &candidates, self.thresholds);
        tracing::debug!(
            track = %source.title,
            status = ?verdict.status(),
            confidence = ?verdict.confidence(),
            candidates = candidates.len(),
            "Match verdict"
        );
        verdict
    }
}

/// Score candidates and band the best one into a verdict. Pure.
pub(crate) fn evaluate(
    source: &Track,
    candidates: &[Track],
    thresholds: MatchThresholds,
) -> MatchResult {
    let Some((best, score)) = best_candidate(source, candidates) else {
        return MatchResult::Unmatched { reason: "no candidates".into() };
    };

    if score >= thresholds.matched {
        MatchResult::Matched { target_id: best.id.clone(), confidence: score }
    } else if score >= thresholds.low_confidence {
        MatchResult::LowConfidence { target_id: best.id.clone(), confidence: score }
    } else {
        MatchResult::Unmatched { reason: "score too low".into() }
    }
}

/// Maximum-scoring candidate; ties keep the first in the service's returned
/// order (the comparison is strict).
fn best_candidate<'a>(source: &Track, candidates: &'a [Track]) -> Option<(&'a Track, f64)> {
    let mut best: Option<(&Track, f64)> = None;
    for candidate in candidates {
        let score = score_candidate(source, candidate);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Heuristic similarity score; clamped to [0,1] only by the banding above.
pub(crate) fn score_candidate(source: &Track, candidate: &Track) -> f64 {
    let mut score = 0.0;

    if normalize(&candidate.title) == normalize(&source.title) {
        score += 0.5;
    }

    if let (Some(candidate_artist), Some(source_artist)) =
        (candidate.primary_artist(), source.primary_artist())
    {
        if normalize(candidate_artist) == normalize(source_artist) {
            score += 0.3;
        }
    }

    // Duration only counts when the source duration is known.
    if let Some(source_ms) = source.duration_ms {
        let delta = source_ms.abs_diff(candidate.duration_ms.unwrap_or(0));
        if delta <= 2000 {
            score += 0.2;
        } else if delta <= 5000 {
            score += 0.1;
        } else {
            score -= 0.3;
        }
    }

    if VARIANT_MARKERS.is_match(&candidate.title) && !VARIANT_MARKERS.is_match(&source.title) {
        score -= 0.3;
    }

    if let (Some(source_explicit), Some(candidate_explicit)) = (source.explicit, candidate.explicit)
    {
        if source_explicit != candidate_explicit {
            score -= 0.1;
        }
    }

    score
}
