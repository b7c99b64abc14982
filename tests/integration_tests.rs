//! # Integration Tests for PulseTempo
//!
//! Whole sessions driven through the public API, plus the CLI binary
//! against a throwaway library.

use anyhow::Result;
use pulsetempo::config::EngineSettings;
use pulsetempo::navigation::NavigationQueue;
use pulsetempo::playback::LogTransport;
use pulsetempo::session::{SessionSnapshot, SessionSummary};
use pulsetempo::track::{Catalog, Track};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn catalog(tracks: &[(&str, Option<u32>)]) -> Catalog {
    tracks
        .iter()
        .map(|(id, tempo)| Track::with_tempo(*id, *tempo))
        .collect()
}

fn played(snapshot: &SessionSnapshot) -> Vec<&str> {
    snapshot.history.iter().map(|r| r.track_id.as_str()).collect()
}

fn current(snapshot: &SessionSnapshot) -> Option<&str> {
    snapshot.current_track.as_ref().map(|id| id.as_str())
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_two_track_run() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("1", Some(150)), ("2", Some(100))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.heart_rate(150.0)?;
        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("2"));
        assert_eq!(snapshot.pending.as_ref().map(|id| id.as_str()), Some("1"));

        queue.next(Some(150.0))?;
        queue.next(None)?;

        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(played(&snapshot), vec!["2", "1", "2"]);
        assert_eq!(current(&snapshot), Some("2"));
        assert_eq!(snapshot.average_heart_rate, Some(150.0));
        assert_eq!(snapshot.history[1].heart_rate, Some(150.0));
        Ok(())
    }

    #[test]
    fn test_backward_then_forward() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("a", Some(100)), ("b", Some(130)), ("c", Some(170))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.next(Some(145.0))?;
        queue.next(Some(185.0))?;
        queue.previous()?;

        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("b"));
        assert_eq!(played(&snapshot), vec!["a", "b", "c", "b"]);

        queue.next(Some(185.0))?;
        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("c"));
        Ok(())
    }

    #[test]
    fn test_backward_at_floor_changes_nothing() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("a", Some(100)), ("b", Some(150))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        let before = queue.snapshot()?.expect("session started");
        queue.previous()?;
        let after = queue.snapshot()?.expect("session started");

        assert_eq!(current(&after), current(&before));
        assert_eq!(after.history, before.history);
        Ok(())
    }

    #[test]
    fn test_rapid_backward_skips_collapse() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("a", Some(100)), ("b", Some(130)), ("c", Some(150)), ("d", Some(170))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.next(Some(145.0))?;
        queue.next(Some(165.0))?;
        queue.previous()?;
        queue.previous()?;

        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("b"));

        thread::sleep(Duration::from_millis(350));
        queue.previous()?;
        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("a"));
        Ok(())
    }

    #[test]
    fn test_rotation_cycles_small_catalog() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("a", Some(150)), ("b", Some(150)), ("c", Some(150))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.heart_rate(165.0)?;
        for _ in 0..8 {
            queue.next(None)?;
            let snapshot = queue.snapshot()?.expect("session started");
            assert!(snapshot.played_ids.len() <= 3);
            assert!(snapshot.has_played(current(&snapshot).expect("playing")));
        }

        let snapshot = queue.snapshot()?.expect("session started");
        let ids = played(&snapshot);
        assert_eq!(ids.len(), 9);
        for pair in ids.windows(2) {
            assert_ne!(pair[0], pair[1], "same track twice in a row: {ids:?}");
        }
        for id in ["a", "b", "c"] {
            assert!(ids.iter().filter(|p| **p == id).count() >= 2, "{id} starved: {ids:?}");
        }
        Ok(())
    }

    #[test]
    fn test_known_tempo_beats_unknown() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("x", None), ("y", None), ("slow", Some(60))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.next(Some(185.0))?;
        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(played(&snapshot), vec!["slow", "x"]);

        // Only unknown-tempo tracks left besides the current one.
        queue.next(Some(185.0))?;
        let snapshot = queue.snapshot()?.expect("session started");
        assert_eq!(current(&snapshot), Some("slow"));
        Ok(())
    }

    #[test]
    fn test_summary_after_finish() -> Result<()> {
        let queue = NavigationQueue::spawn(
            catalog(&[("1", Some(150)), ("2", Some(100))]),
            &EngineSettings::default(),
            LogTransport,
        )?;

        queue.start()?;
        queue.heart_rate(150.0)?;
        queue.cadence(172.0)?;
        queue.heart_rate(170.0)?;
        queue.distance(800.0)?;
        queue.next(None)?;

        let summary = queue.finish()?.expect("session started");
        assert_eq!(summary.average_heart_rate, Some(160.0));
        assert_eq!(summary.max_heart_rate, Some(170.0));
        assert_eq!(summary.average_cadence, Some(172.0));
        assert_eq!(summary.total_distance_m, Some(800.0));
        assert!(summary.ended_at.is_some());
        assert_eq!(summary.tracks.len(), 2);
        assert_eq!(summary.tracks[1].heart_rate, Some(170.0));
        Ok(())
    }
}

#[cfg(test)]
mod selection_tests {
    use pulsetempo::algorithm::{self, ScoringContext};
    use pulsetempo::track::{Track, TrackId};
    use pulsetempo::zone::{self, Zone};
    use std::collections::HashSet;

    #[test]
    fn test_tempo_outweighs_variety() {
        let tracks = [Track::with_tempo("fresh", Some(125)), Track::with_tempo("played", Some(150))];
        let played: HashSet<TrackId> = [TrackId::from("played")].into_iter().collect();

        let best = algorithm::pick_best(&tracks, 150, &played, &ScoringContext::default())
            .expect("candidates");
        assert_eq!(best.track.id.as_str(), "played");
    }

    #[test]
    fn test_variety_breaks_tempo_ties() {
        let tracks = [Track::with_tempo("played", Some(130)), Track::with_tempo("fresh", Some(130))];
        let played: HashSet<TrackId> = [TrackId::from("played")].into_iter().collect();

        let best = algorithm::pick_best(&tracks, 130, &played, &ScoringContext::default())
            .expect("candidates");
        assert_eq!(best.track.id.as_str(), "fresh");
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(zone::classify(139.9), (Zone::Low, 100));
        assert_eq!(zone::classify(140.0), (Zone::Moderate, 130));
        assert_eq!(zone::classify(159.9), (Zone::Moderate, 130));
        assert_eq!(zone::classify(160.0), (Zone::High, 150));
        assert_eq!(zone::classify(180.0), (Zone::Maximum, 170));
        assert_eq!(zone::classify(230.0), (Zone::Maximum, 170));
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    fn pulsetempo(dir: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pulsetempo"))
            .arg("--db")
            .arg(dir.join("library.db"))
            .arg("--settings")
            .arg(dir.join("settings.json"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run pulsetempo")
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    fn library_with_easy_playlist() -> Result<TempDir> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path();
        let tracks = write(
            dir,
            "tracks.json",
            r#"[
                {"id": "1", "title": "Stride", "artist": "Band", "bpm": 150.2, "confidence": 0.9},
                {"id": "2", "title": "Stroll", "artist": "Band", "bpm": 99.6, "confidence": 0.8},
                {"id": "3", "title": "Unmeasured", "artist": "Band"}
            ]"#,
        );

        assert!(pulsetempo(dir, &["init"]).status.success());
        assert!(pulsetempo(dir, &["register", tracks.to_str().expect("utf-8 path")]).status.success());
        assert!(pulsetempo(dir, &["playlist", "create", "easy", "Easy run"]).status.success());
        assert!(pulsetempo(dir, &["playlist", "add", "easy", "1", "2"]).status.success());
        Ok(temp_dir)
    }

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new(env!("CARGO_BIN_EXE_pulsetempo"))
            .arg("--help")
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("pulsetempo"));
        assert!(stdout.contains("playlist"));
        assert!(stdout.contains("run"));
    }

    #[test]
    fn test_completion_generation() {
        let output = Command::new(env!("CARGO_BIN_EXE_pulsetempo"))
            .args(["completion", "bash"])
            .output()
            .expect("Failed to run completion command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_pulsetempo"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_zone_command() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let output = pulsetempo(temp_dir.path(), &["zone", "165"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("high"));
        assert!(stdout.contains("150"));
    }

    #[test]
    fn test_tracks_lists_rounded_tempo() -> Result<()> {
        let temp_dir = library_with_easy_playlist()?;
        let output = pulsetempo(temp_dir.path(), &["tracks"]);
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Band - Stride [150 bpm]"));
        assert!(stdout.contains("Band - Stroll [100 bpm]"));
        assert!(stdout.contains("Band - Unmeasured [? bpm]"));
        Ok(())
    }

    #[test]
    fn test_scripted_run_prints_summary() -> Result<()> {
        let temp_dir = library_with_easy_playlist()?;
        let dir = temp_dir.path();
        let script = write(dir, "run.txt", "# easy loop\nhr 150\nnext\nnext 100\nstop\n");

        let output = pulsetempo(
            dir,
            &["run", "--playlist", "easy", "--script", script.to_str().expect("utf-8 path")],
        );
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let summary: SessionSummary = serde_json::from_slice(&output.stdout)?;
        let ids: Vec<&str> = summary.tracks.iter().map(|r| r.track_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "2"]);
        assert_eq!(summary.tracks[0].heart_rate, None);
        assert_eq!(summary.average_heart_rate, Some(150.0));
        assert!(summary.ended_at.is_some());
        Ok(())
    }

    #[test]
    fn test_run_with_empty_selection_fails_early() -> Result<()> {
        let temp_dir = library_with_easy_playlist()?;
        let dir = temp_dir.path();
        assert!(pulsetempo(dir, &["playlist", "create", "empty"]).status.success());
        let script = write(dir, "run.txt", "next\n");

        let output = pulsetempo(
            dir,
            &["run", "--playlist", "empty", "--script", script.to_str().expect("utf-8 path")],
        );
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("contain no tracks"));

        let output = pulsetempo(
            dir,
            &["run", "--playlist", "ghost", "--script", script.to_str().expect("utf-8 path")],
        );
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("ghost"));
        Ok(())
    }

    #[test]
    fn test_bad_script_is_reported_with_line() -> Result<()> {
        let temp_dir = library_with_easy_playlist()?;
        let dir = temp_dir.path();
        let script = write(dir, "run.txt", "hr 150\nsprint\n");

        let output = pulsetempo(
            dir,
            &["run", "--playlist", "easy", "--script", script.to_str().expect("utf-8 path")],
        );
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
        Ok(())
    }
}
