//! Candidate scoring for tempo-matched selection.
//!
//! Each candidate gets a combined score from two parts:
//!
//! ```text
//! score(track) = tempo_weight   * tempo_fit(|track.tempo - ideal|)
//!              + variety_weight * variety(track, played_ids)
//! ```
//!
//! `tempo_weight` is kept strictly above `variety_weight`, so variety only
//! separates tracks whose tempo fit is already close.

use crate::track::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Scores within this distance of each other count as equal.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Variety for a track that has not been played in the current rotation.
pub const VARIETY_FRESH: f64 = 1.0;
/// Variety for a track already played in the current rotation.
pub const VARIETY_PLAYED: f64 = 0.5;

/// Immutable scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub tempo_weight: f64,
    pub variety_weight: f64,
    /// Tempo difference (BPM) at which the fit bottoms out.
    pub tempo_falloff_bpm: f64,
    /// Fit assigned to any known tempo at or past the falloff. Kept above
    /// zero so a badly matched known tempo still beats an unknown one.
    pub tempo_floor: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            tempo_weight: 0.7,
            variety_weight: 0.3,
            tempo_falloff_bpm: 50.0,
            tempo_floor: 0.01,
        }
    }
}

/// A candidate together with its combined score.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub track: &'a Track,
    pub score: f64,
}

/// How well a tempo fits the target, in `[0, 1]`.
///
/// Unknown tempo scores 0. Known tempo follows `1 - (d / falloff)^2`,
/// clamped at `tempo_floor`: 1.0 at a perfect match, 0.75 a half-falloff
/// away, floor at or past the falloff.
#[must_use]
pub fn tempo_fit(tempo: Option<u32>, ideal: u32, context: &ScoringContext) -> f64 {
    match tempo {
        None => 0.0,
        Some(bpm) => {
            let diff = f64::from(bpm.abs_diff(ideal));
            let ratio = diff / context.tempo_falloff_bpm;
            (1.0 - ratio * ratio).max(context.tempo_floor)
        }
    }
}

/// Variety bonus. No third tier.
#[must_use]
pub fn variety(id: &TrackId, played_ids: &HashSet<TrackId>) -> f64 {
    if played_ids.contains(id) {
        VARIETY_PLAYED
    } else {
        VARIETY_FRESH
    }
}

/// Combined score for one track against the current rotation.
#[must_use]
pub fn calculate_score(
    track: &Track,
    ideal: u32,
    played_ids: &HashSet<TrackId>,
    context: &ScoringContext,
) -> f64 {
    let score = (context.tempo_weight * tempo_fit(track.tempo, ideal, context))
        .pipe(|fit| fit + context.variety_weight * variety(&track.id, played_ids));
    log::trace!("Scored `{}' at {score:.4} against ideal {ideal}", track.id);
    score
}

/// Pick the best candidate, or `None` when there are no candidates.
///
/// Tracks without a known tempo are only considered when no candidate has
/// one. Ties keep the candidate that came first.
pub fn pick_best<'a, I>(
    candidates: I,
    ideal: u32,
    played_ids: &HashSet<TrackId>,
    context: &ScoringContext,
) -> Option<Scored<'a>>
where
    I: IntoIterator<Item = &'a Track>,
{
    let candidates: Vec<&Track> = candidates.into_iter().collect();
    let any_known = candidates.iter().any(|t| t.tempo.is_some());

    candidates
        .into_iter()
        .filter(|t| !any_known || t.tempo.is_some())
        .map(|track| Scored {
            track,
            score: calculate_score(track, ideal, played_ids, context),
        })
        .fold(None, |best: Option<Scored<'a>>, next| match best {
            Some(b) if next.score <= b.score + SCORE_EPSILON => Some(b),
            _ => Some(next),
        })
}

/// Rank every candidate by score, best first, stable on ties.
///
/// Selection only needs the best candidate ([`pick_best`]); this exists for
/// the benchmarks and for checking score ordering in tests.
#[doc(hidden)]
#[must_use]
pub fn rank<'a>(
    tracks: &'a [Track],
    ideal: u32,
    played_ids: &HashSet<TrackId>,
    context: &ScoringContext,
) -> Vec<Scored<'a>> {
    let mut ranked: Vec<Scored<'a>> = tracks
        .iter()
        .map(|track| Scored {
            track,
            score: calculate_score(track, ideal, played_ids, context),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

/// Pipeline helper.
trait PipelineExt<T> {
    fn pipe<U>(self, f: impl FnOnce(T) -> U) -> U;
}

impl<T> PipelineExt<T> for T {
    #[inline]
    fn pipe<U>(self, f: impl FnOnce(T) -> U) -> U {
        f(self)
    }
}
