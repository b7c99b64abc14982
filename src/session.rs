//! # Session State
//!
//! The single mutable record of one run: what is playing, what has been
//! played, and the running heart-rate/cadence aggregates.
//!
//! Only the navigation worker ever holds a `SessionState` mutably. Everyone
//! else sees [`SessionSnapshot`]s, which are plain copies taken after a
//! command has been applied in full.
//!
//! ## History vs. trail
//!
//! `history` is the append-only log of every track that started playing,
//! including tracks returned to by a backward skip. The navigation `trail` is
//! the path a backward skip walks: skipping forward pushes onto it, skipping
//! backward pops from it.

use crate::track::TrackId;
use crate::zone::Zone;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

/// One heart-rate reading from the sensor feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub at: DateTime<Utc>,
    pub bpm: f64,
}

impl HeartRateSample {
    pub fn now(bpm: f64) -> Self {
        Self { at: Utc::now(), bpm }
    }
}

/// A track that started playing during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub track_id: TrackId,
    /// Milliseconds since session start.
    pub offset_ms: u64,
    /// Heart rate current when the track started, if any was known.
    pub heart_rate: Option<f64>,
}

/// A next-track decision held back until the runner skips forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCandidate {
    pub track_id: TrackId,
    /// The track that was current when this candidate was computed.
    pub computed_for: Option<TrackId>,
    pub zone: Zone,
    pub ideal_tempo: u32,
}

/// Count/sum/max accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    max: Option<f64>,
}

impl RunningStats {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Mutable state for one run.
#[derive(Debug)]
pub struct SessionState {
    current: Option<TrackId>,
    status: PlaybackStatus,
    history: Vec<PlayRecord>,
    trail: Vec<TrackId>,
    played_ids: HashSet<TrackId>,
    /// `played_ids` is reset once it reaches this many entries.
    rotation_limit: usize,
    latest_heart_rate: Option<HeartRateSample>,
    heart_rate: RunningStats,
    cadence: RunningStats,
    distance_m: Option<f64>,
    pending: Option<PendingCandidate>,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    stopped_at: Option<Instant>,
    ended_wall: Option<DateTime<Utc>>,
    last_transport_error: Option<String>,
}

impl SessionState {
    /// Fresh session, started now.
    ///
    /// `catalog_len` bounds the rotation window, optionally narrowed further
    /// by `rotation_window`.
    pub fn new(catalog_len: usize, rotation_window: Option<usize>) -> Self {
        let rotation_limit = match rotation_window {
            Some(window) if window > 0 => window.min(catalog_len),
            _ => catalog_len,
        };

        Self {
            current: None,
            status: PlaybackStatus::Paused,
            history: Vec::new(),
            trail: Vec::new(),
            played_ids: HashSet::new(),
            rotation_limit,
            latest_heart_rate: None,
            heart_rate: RunningStats::default(),
            cadence: RunningStats::default(),
            distance_m: None,
            pending: None,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            stopped_at: None,
            ended_wall: None,
            last_transport_error: None,
        }
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.current.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PlaybackStatus) {
        self.status = status;
    }

    pub fn history(&self) -> &[PlayRecord] {
        &self.history
    }

    pub fn played_ids(&self) -> &HashSet<TrackId> {
        &self.played_ids
    }

    pub fn latest_heart_rate(&self) -> Option<f64> {
        self.latest_heart_rate.map(|s| s.bpm)
    }

    pub fn pending(&self) -> Option<&PendingCandidate> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, pending: Option<PendingCandidate>) {
        self.pending = pending;
    }

    pub fn take_pending(&mut self) -> Option<PendingCandidate> {
        self.pending.take()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    pub fn set_transport_error(&mut self, error: Option<String>) {
        self.last_transport_error = error;
    }

    /// Wall-clock time since start, frozen once stopped.
    pub fn elapsed(&self) -> Duration {
        match self.stopped_at {
            Some(stopped) => stopped.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    /// Make `id` current as a forward step: extend the trail, log the play,
    /// and mark it played in the rotation.
    pub fn record_forward(&mut self, id: TrackId) {
        self.trail.push(id.clone());
        self.log_play(&id);
        self.remember_played(&id);
        self.current = Some(id);
    }

    /// Step back one entry along the trail.
    ///
    /// Returns the track that became current, or `None` (and changes
    /// nothing) when there is nowhere to go back to. A held candidate is
    /// dropped, since it was computed for the track being left.
    pub fn step_back(&mut self) -> Option<TrackId> {
        if self.trail.len() < 2 {
            return None;
        }
        self.trail.pop();
        let back = self.trail.last().cloned()?;
        self.log_play(&back);
        self.pending = None;
        self.current = Some(back.clone());
        Some(back)
    }

    pub fn record_heart_rate(&mut self, sample: HeartRateSample) {
        self.heart_rate.record(sample.bpm);
        self.latest_heart_rate = Some(sample);
    }

    pub fn record_cadence(&mut self, steps_per_minute: f64) {
        self.cadence.record(steps_per_minute);
    }

    pub fn record_distance(&mut self, meters: f64) {
        *self.distance_m.get_or_insert(0.0) += meters;
    }

    /// Freeze the clock and drop any held candidate.
    pub fn stop(&mut self) {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
            self.ended_wall = Some(Utc::now());
        }
        self.pending = None;
        self.status = PlaybackStatus::Paused;
    }

    fn log_play(&mut self, id: &TrackId) {
        #[allow(clippy::cast_possible_truncation)]
        let offset_ms = self.elapsed().as_millis() as u64;
        self.history.push(PlayRecord {
            track_id: id.clone(),
            offset_ms,
            heart_rate: self.latest_heart_rate(),
        });
    }

    fn remember_played(&mut self, id: &TrackId) {
        self.played_ids.insert(id.clone());
        if self.rotation_limit > 0 && self.played_ids.len() >= self.rotation_limit {
            debug!(
                "Rotation exhausted after {} tracks, starting a new one",
                self.played_ids.len()
            );
            self.played_ids.clear();
            self.played_ids.insert(id.clone());
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut played_ids: Vec<TrackId> = self.played_ids.iter().cloned().collect();
        played_ids.sort();

        SessionSnapshot {
            current_track: self.current.clone(),
            status: self.status,
            history: self.history.clone(),
            played_ids,
            pending: self.pending.as_ref().map(|p| p.track_id.clone()),
            latest_heart_rate: self.latest_heart_rate,
            average_heart_rate: self.heart_rate.average(),
            max_heart_rate: self.heart_rate.max(),
            average_cadence: self.cadence.average(),
            total_distance_m: self.distance_m,
            elapsed: self.elapsed(),
            stopped: self.is_stopped(),
            last_transport_error: self.last_transport_error.clone(),
        }
    }

    /// Finalized run record. A pure read; it is meaningful once stopped.
    pub fn summary(&self) -> SessionSummary {
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = self.elapsed().as_millis() as u64;
        SessionSummary {
            started_at: self.started_wall,
            ended_at: self.ended_wall,
            elapsed_ms,
            average_heart_rate: self.heart_rate.average(),
            max_heart_rate: self.heart_rate.max(),
            average_cadence: self.cadence.average(),
            total_distance_m: self.distance_m,
            tracks: self.history.clone(),
        }
    }
}

/// Point-in-time copy of a session, safe to hand to any thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub current_track: Option<TrackId>,
    pub status: PlaybackStatus,
    pub history: Vec<PlayRecord>,
    /// Sorted for stable comparisons.
    pub played_ids: Vec<TrackId>,
    pub pending: Option<TrackId>,
    pub latest_heart_rate: Option<HeartRateSample>,
    pub average_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub total_distance_m: Option<f64>,
    pub elapsed: Duration,
    pub stopped: bool,
    pub last_transport_error: Option<String>,
}

impl SessionSnapshot {
    pub fn last_played(&self) -> Option<&TrackId> {
        self.history.last().map(|r| &r.track_id)
    }

    pub fn has_played(&self, id: &str) -> bool {
        self.played_ids.iter().any(|p| p.as_str() == id)
    }
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    pub average_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub total_distance_m: Option<f64>,
    pub tracks: Vec<PlayRecord>,
}
