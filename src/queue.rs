//! # Selection Orchestrator
//!
//! Decides which track plays next. Decisions happen at four points:
//!
//! - **start**: pick an opening track with no heart-rate input
//! - **heart-rate update**: recompute the best next track and hold it as a
//!   pre-queued candidate, leaving the current track alone
//! - **skip forward**: commit to the best next track and make it current
//! - **skip backward**: return to the previous entry of the trail
//!
//! Selection scores every catalog track except the current one with
//! [`algorithm::pick_best`]. When excluding the current track leaves nothing,
//! the current track is allowed back in, so a non-empty catalog always
//! produces a pick.

use crate::algorithm::{self, ScoringContext};
use crate::session::{PendingCandidate, SessionState};
use crate::track::{Catalog, Track};
use crate::zone::{self, Zone};
use log::{debug, info};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// How the opening track is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartStrategy {
    /// Best match for a runner at rest (the `Low` zone target).
    #[default]
    Resting,
    /// First track in catalog order.
    First,
    /// Uniformly random.
    Random,
}

/// A scored selection.
#[derive(Debug, Clone, Copy)]
pub struct Decision<'a> {
    pub track: &'a Track,
    pub zone: Zone,
    pub ideal_tempo: u32,
    pub score: f64,
}

/// Turns the catalog and session state into track decisions.
#[derive(Debug)]
pub struct Orchestrator {
    catalog: Catalog,
    scoring: ScoringContext,
    start: StartStrategy,
}

impl Orchestrator {
    #[must_use]
    pub fn new(catalog: Catalog, scoring: ScoringContext, start: StartStrategy) -> Self {
        Self {
            catalog,
            scoring,
            start,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Opening pick. `None` only for an empty catalog.
    pub fn initial_track(&self) -> Option<&Track> {
        match self.start {
            StartStrategy::First => self.catalog.first(),
            StartStrategy::Random => self.catalog.tracks().choose(&mut rand::thread_rng()),
            StartStrategy::Resting => {
                let (_, ideal) = zone::classify_or_resting(None);
                algorithm::pick_best(
                    self.catalog.tracks(),
                    ideal,
                    &Default::default(),
                    &self.scoring,
                )
                .map(|s| s.track)
            }
        }
    }

    /// Best track to follow the current one, for `heart_rate` (or a runner
    /// at rest when no rate is known).
    pub fn best_next(&self, state: &SessionState, heart_rate: Option<f64>) -> Option<Decision<'_>> {
        let (zone, ideal) = zone::classify_or_resting(heart_rate);
        let played = state.played_ids();

        let others = self
            .catalog
            .tracks()
            .iter()
            .filter(|t| Some(&t.id) != state.current());

        let best = algorithm::pick_best(others, ideal, played, &self.scoring).or_else(|| {
            debug!("No candidate besides the current track, allowing it back in");
            algorithm::pick_best(self.catalog.tracks(), ideal, played, &self.scoring)
        })?;

        Some(Decision {
            track: best.track,
            zone,
            ideal_tempo: ideal,
            score: best.score,
        })
    }

    /// Begin the session with the opening track.
    pub fn start(&self, state: &mut SessionState) -> Option<&Track> {
        let Some(track) = self.initial_track() else {
            info!("Catalog is empty, nothing to play");
            return None;
        };
        info!("Opening with {track}");
        state.record_forward(track.id.clone());
        Some(track)
    }

    /// Recompute the held candidate from the latest heart rate. Does not
    /// touch the current track.
    pub fn prequeue(&self, state: &mut SessionState) -> Option<&Track> {
        let decision = self.best_next(state, state.latest_heart_rate());
        let pending = decision.map(|d| PendingCandidate {
            track_id: d.track.id.clone(),
            computed_for: state.current().cloned(),
            zone: d.zone,
            ideal_tempo: d.ideal_tempo,
        });

        if let Some(d) = &decision {
            debug!(
                "Pre-queued {} for {} zone (ideal {}, score {:.3})",
                d.track, d.zone, d.ideal_tempo, d.score
            );
        }
        state.set_pending(pending);
        decision.map(|d| d.track)
    }

    /// Switch to the next track.
    ///
    /// Uses the held candidate when it was computed for the still-current
    /// track and no heart-rate override is given; otherwise selects afresh
    /// from `approximate_heart_rate` or the latest sample.
    pub fn commit_next(
        &self,
        state: &mut SessionState,
        approximate_heart_rate: Option<f64>,
    ) -> Option<&Track> {
        let held = state
            .take_pending()
            .filter(|p| approximate_heart_rate.is_none() && p.computed_for.as_ref() == state.current())
            .and_then(|p| self.catalog.get(&p.track_id));

        let track = match held {
            Some(track) => {
                debug!("Committing pre-queued {track}");
                track
            }
            None => {
                let heart_rate = approximate_heart_rate.or_else(|| state.latest_heart_rate());
                let decision = self.best_next(state, heart_rate)?;
                debug!(
                    "Selected {} for {} zone (ideal {}, score {:.3})",
                    decision.track, decision.zone, decision.ideal_tempo, decision.score
                );
                decision.track
            }
        };

        info!("Skipping forward to {track}");
        state.record_forward(track.id.clone());
        Some(track)
    }

    /// Go back one step. `None` when there is nothing to go back to.
    pub fn step_back(&self, state: &mut SessionState) -> Option<&Track> {
        let id = state.step_back()?;
        let track = self.catalog.get(&id)?;
        info!("Skipping back to {track}");
        Some(track)
    }
}
