//! # Track Library
//!
//! SQLite store of known tracks and the playlists a runner can pick from.
//! A session [`Catalog`] is built from here, and this is where "nothing
//! selected" is caught, before any session starts.
//!
//! ## Schema
//!
//! ```text
//! tracks(id PK, title, artist, bpm NULL, confidence NULL, duration_secs NULL, source NULL)
//! playlists(id PK, name)
//! playlist_tracks(playlist_id, track_id, position)
//! ```
//!
//! BPM is stored as measured (fractional). It is rounded to whole BPM when a
//! catalog is built.

use crate::track::{Catalog, Track, TrackId};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// A track as submitted for registration, e.g. from a JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub bpm: Option<f64>,
    /// How much to trust `bpm`, 0.0 to 1.0.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Open (creating if needed) the library at `path` and ensure the schema.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open track library at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tracks (
            id            TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            artist        TEXT NOT NULL,
            bpm           REAL,
            confidence    REAL,
            duration_secs REAL,
            source        TEXT
        );
        CREATE TABLE IF NOT EXISTS playlists (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS playlist_tracks (
            playlist_id TEXT NOT NULL REFERENCES playlists(id),
            track_id    TEXT NOT NULL REFERENCES tracks(id),
            position    INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, track_id)
        );",
    )
    .context("Failed to create track library schema")?;
    Ok(())
}

/// Insert new tracks; for known ones, take the new BPM only if it is
/// present and the stored BPM is missing or less trusted.
///
/// Returns how many tracks were newly inserted.
pub fn register_tracks(conn: &mut Connection, records: &[TrackRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;

    for record in records {
        let existing: Option<(Option<f64>, Option<f64>)> = tx
            .query_row(
                "SELECT bpm, confidence FROM tracks WHERE id = ?1",
                [&record.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("Failed to look up track `{}'", record.id))?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO tracks (id, title, artist, bpm, confidence, duration_secs, source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.id,
                        record.title,
                        record.artist,
                        record.bpm,
                        record.confidence,
                        record.duration_secs,
                        record.source,
                    ],
                )
                .with_context(|| format!("Failed to insert track `{}'", record.id))?;
                inserted += 1;
            }
            Some((stored_bpm, stored_confidence)) => {
                let newer_is_better = record.bpm.is_some()
                    && (stored_bpm.is_none()
                        || record.confidence.unwrap_or(0.0) > stored_confidence.unwrap_or(0.0));
                if newer_is_better {
                    debug!("Updating BPM of `{}' to {:?}", record.id, record.bpm);
                    tx.execute(
                        "UPDATE tracks SET bpm = ?1, confidence = ?2 WHERE id = ?3",
                        params![record.bpm, record.confidence, record.id],
                    )
                    .with_context(|| format!("Failed to update track `{}'", record.id))?;
                }
            }
        }
    }

    tx.commit().context("Committing track registration failed")?;
    info!("Registered {} tracks ({inserted} new)", records.len());
    Ok(inserted)
}

/// Every track in the library, ordered by id.
pub fn list_tracks(conn: &Connection) -> Result<Vec<Track>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, artist, bpm, duration_secs FROM tracks ORDER BY id",
    )?;
    let tracks = stmt
        .query_map([], row_to_track)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read tracks")?;
    Ok(tracks)
}

pub fn create_playlist(conn: &Connection, id: &str, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO playlists (id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        params![id, name],
    )
    .with_context(|| format!("Failed to create playlist `{id}'"))?;
    Ok(())
}

/// Append tracks to a playlist, skipping ones already in it.
pub fn add_to_playlist(conn: &mut Connection, playlist_id: &str, track_ids: &[String]) -> Result<()> {
    if !playlist_exists(conn, playlist_id)? {
        bail!("No playlist with id `{playlist_id}'");
    }

    let tx = conn.transaction()?;
    {
        let mut next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_tracks WHERE playlist_id = ?1",
            [playlist_id],
            |row| row.get(0),
        )?;
        let mut known = tx.prepare("SELECT 1 FROM tracks WHERE id = ?1")?;
        let mut insert = tx.prepare(
            "INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id, position) VALUES (?1, ?2, ?3)",
        )?;

        for track_id in track_ids {
            if !known.exists([track_id])? {
                bail!("Unknown track `{track_id}', register it first");
            }
            if insert.execute(params![playlist_id, track_id, next_position])? > 0 {
                next_position += 1;
            }
        }
    }
    tx.commit().context("Committing playlist update failed")?;
    Ok(())
}

/// Track ids of a playlist in playlist order.
pub fn playlist_track_ids(conn: &Connection, playlist_id: &str) -> Result<Vec<TrackId>> {
    let mut stmt = conn.prepare(
        "SELECT track_id FROM playlist_tracks WHERE playlist_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([playlist_id], |row| row.get::<_, String>(0).map(TrackId))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Build a session catalog from the selected playlists.
///
/// Tracks appear in playlist order, first occurrence wins.
///
/// # Errors
///
/// Fails when no playlist is selected, a playlist does not exist, or the
/// selection holds no tracks at all.
pub fn load_catalog(conn: &Connection, playlist_ids: &[String]) -> Result<Catalog> {
    if playlist_ids.is_empty() {
        bail!("No playlists selected. Pick at least one playlist to run with.");
    }

    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT id, title, artist, bpm, duration_secs FROM tracks WHERE id = ?1",
    )?;

    for playlist_id in playlist_ids {
        if !playlist_exists(conn, playlist_id)? {
            bail!("No playlist with id `{playlist_id}'");
        }
        for id in playlist_track_ids(conn, playlist_id)? {
            if !seen.insert(id.clone()) {
                continue;
            }
            let track = stmt
                .query_row([id.as_str()], row_to_track)
                .with_context(|| format!("Failed to load track `{id}'"))?;
            tracks.push(track);
        }
    }

    if tracks.is_empty() {
        bail!(
            "The selected playlists ({}) contain no tracks",
            playlist_ids.join(", ")
        );
    }

    info!("Built catalog of {} tracks from {} playlists", tracks.len(), playlist_ids.len());
    Ok(Catalog::new(tracks))
}

fn playlist_exists(conn: &Connection, playlist_id: &str) -> Result<bool> {
    Ok(conn
        .prepare("SELECT 1 FROM playlists WHERE id = ?1")?
        .exists([playlist_id])?)
}

fn row_to_track(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
    let bpm: Option<f64> = row.get(3)?;
    let duration_secs: Option<f64> = row.get(4)?;
    Ok(Track {
        id: TrackId(row.get(0)?),
        title: row.get(1)?,
        artist: row.get(2)?,
        tempo: bpm.and_then(whole_bpm),
        duration: duration_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64),
    })
}

/// Round a measured tempo to whole BPM, dropping nonsense values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_bpm(bpm: f64) -> Option<u32> {
    (bpm.is_finite() && bpm >= 1.0 && bpm < f64::from(u32::MAX)).then(|| bpm.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, bpm: Option<f64>, confidence: Option<f64>) -> TrackRecord {
        TrackRecord {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: "Artist".to_string(),
            bpm,
            confidence,
            duration_secs: Some(200.0),
            source: Some("test".to_string()),
        }
    }

    fn memory_library() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory database");
        init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn test_register_and_list() -> Result<()> {
        let mut conn = memory_library();
        let inserted = register_tracks(
            &mut conn,
            &[record("b", Some(128.4), Some(0.9)), record("a", None, None)],
        )?;
        assert_eq!(inserted, 2);

        let tracks = list_tracks(&conn)?;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id.as_str(), "a");
        assert_eq!(tracks[0].tempo, None);
        assert_eq!(tracks[1].tempo, Some(128));
        assert_eq!(tracks[1].duration, Some(Duration::from_secs(200)));
        Ok(())
    }

    #[test]
    fn test_bpm_merge_prefers_confidence() -> Result<()> {
        let mut conn = memory_library();
        register_tracks(&mut conn, &[record("t", Some(120.0), Some(0.5))])?;

        // Less trusted value is ignored.
        register_tracks(&mut conn, &[record("t", Some(90.0), Some(0.2))])?;
        assert_eq!(list_tracks(&conn)?[0].tempo, Some(120));

        // Missing value never overwrites.
        register_tracks(&mut conn, &[record("t", None, Some(1.0))])?;
        assert_eq!(list_tracks(&conn)?[0].tempo, Some(120));

        // More trusted value wins.
        let inserted = register_tracks(&mut conn, &[record("t", Some(140.0), Some(0.8))])?;
        assert_eq!(inserted, 0);
        assert_eq!(list_tracks(&conn)?[0].tempo, Some(140));
        Ok(())
    }

    #[test]
    fn test_bpm_fills_missing_value() -> Result<()> {
        let mut conn = memory_library();
        register_tracks(&mut conn, &[record("t", None, None)])?;
        register_tracks(&mut conn, &[record("t", Some(165.0), None)])?;
        assert_eq!(list_tracks(&conn)?[0].tempo, Some(165));
        Ok(())
    }

    #[test]
    fn test_catalog_from_playlists() -> Result<()> {
        let mut conn = memory_library();
        register_tracks(
            &mut conn,
            &[
                record("1", Some(150.0), None),
                record("2", Some(100.0), None),
                record("3", Some(170.0), None),
            ],
        )?;
        create_playlist(&conn, "easy", "Easy run")?;
        create_playlist(&conn, "hard", "Intervals")?;
        add_to_playlist(&mut conn, "easy", &["2".to_string(), "1".to_string()])?;
        add_to_playlist(&mut conn, "hard", &["3".to_string(), "1".to_string()])?;

        let catalog = load_catalog(&conn, &["easy".to_string(), "hard".to_string()])?;
        let order: Vec<&str> = catalog.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["2", "1", "3"]);
        Ok(())
    }

    #[test]
    fn test_catalog_preconditions() -> Result<()> {
        let conn = memory_library();
        let err = load_catalog(&conn, &[]).unwrap_err();
        assert!(err.to_string().contains("No playlists selected"));

        let err = load_catalog(&conn, &["ghost".to_string()]).unwrap_err();
        assert!(err.to_string().contains("ghost"));

        create_playlist(&conn, "empty", "Nothing here")?;
        let err = load_catalog(&conn, &["empty".to_string()]).unwrap_err();
        assert!(err.to_string().contains("contain no tracks"));
        Ok(())
    }

    #[test]
    fn test_add_unknown_track_fails() -> Result<()> {
        let mut conn = memory_library();
        create_playlist(&conn, "p", "P")?;
        assert!(add_to_playlist(&mut conn, "p", &["nope".to_string()]).is_err());
        assert!(add_to_playlist(&mut conn, "missing", &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_adding_twice_keeps_position() -> Result<()> {
        let mut conn = memory_library();
        register_tracks(&mut conn, &[record("x", Some(120.0), None), record("y", Some(130.0), None)])?;
        create_playlist(&conn, "p", "P")?;
        add_to_playlist(&mut conn, "p", &["x".to_string()])?;
        add_to_playlist(&mut conn, "p", &["y".to_string(), "x".to_string()])?;
        let ids: Vec<String> = playlist_track_ids(&conn, "p")?.into_iter().map(|id| id.0).collect();
        assert_eq!(ids, vec!["x", "y"]);
        Ok(())
    }

    #[test]
    fn test_whole_bpm() {
        assert_eq!(whole_bpm(127.5), Some(128));
        assert_eq!(whole_bpm(0.0), None);
        assert_eq!(whole_bpm(-10.0), None);
        assert_eq!(whole_bpm(f64::NAN), None);
    }
}
