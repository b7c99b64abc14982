//! Tracks and the immutable catalog a session selects from.
//!
//! A [`Catalog`] is a snapshot taken when a session starts. It never changes
//! while the session runs, so the selection engine can hold plain references
//! into it and rely on iteration order for deterministic tie-breaks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Identity of a track, as handed to us by the music library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A candidate track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    /// Tempo in whole BPM. `None` when nobody has measured it yet.
    pub tempo: Option<u32>,
    #[serde(default)]
    pub duration: Option<Duration>,
}

impl Track {
    /// Bare track with only an id and a tempo, mostly for tests and benches.
    pub fn with_tempo(id: impl Into<String>, tempo: Option<u32>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            artist: String::new(),
            id: TrackId(id),
            tempo,
            duration: None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.artist.is_empty(), self.tempo) {
            (true, Some(bpm)) => write!(f, "{} [{bpm} bpm]", self.title),
            (true, None) => write!(f, "{} [? bpm]", self.title),
            (false, Some(bpm)) => write!(f, "{} - {} [{bpm} bpm]", self.artist, self.title),
            (false, None) => write!(f, "{} - {} [? bpm]", self.artist, self.title),
        }
    }
}

/// Read-only set of candidate tracks, in the order they were supplied.
///
/// An empty catalog is allowed. Sessions over it simply never select anything.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
    index: HashMap<TrackId, usize>,
}

impl Catalog {
    /// Build a catalog, keeping the first occurrence of any duplicated id.
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut kept = Vec::with_capacity(tracks.len());
        let mut index = HashMap::with_capacity(tracks.len());

        for track in tracks {
            if index.contains_key(&track.id) {
                log::debug!("Dropping duplicate catalog entry `{}'", track.id);
                continue;
            }
            index.insert(track.id.clone(), kept.len());
            kept.push(track);
        }

        Self { tracks: kept, index }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn first(&self) -> Option<&Track> {
        self.tracks.first()
    }
}

impl FromIterator<Track> for Catalog {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
