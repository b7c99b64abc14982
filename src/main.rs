//! # PulseTempo
//!
//! Command-line front end: manages the track library and runs scripted
//! sessions whose music follows the runner's heart rate.
//!
//! ## Usage
//!
//! ```bash
//! # Build a library
//! pulsetempo init
//! pulsetempo register analysed.json
//! pulsetempo playlist create easy "Easy run"
//! pulsetempo playlist add easy t01 t02 t03
//!
//! # Run a session
//! pulsetempo run --playlist easy --script run.txt
//!
//! # Where would 152 bpm land?
//! pulsetempo zone 152
//! ```

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::info;
use pulsetempo::cli::{self, PlaylistAction, Transport};
use pulsetempo::config::{EngineSettings, RuntimeConfig};
use pulsetempo::library::{self, TrackRecord};
use pulsetempo::navigation::NavigationQueue;
use pulsetempo::playback::{LogTransport, MpcTransport, PlaybackTransport};
use pulsetempo::track::Catalog;
use pulsetempo::{completion, script, zone};
use std::fs;
use std::path::Path;

/// Logging is controlled through `RUST_LOG`:
/// - `RUST_LOG=info pulsetempo run ...` - track switches
/// - `RUST_LOG=pulsetempo::navigation=debug pulsetempo run ...` - every command
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config = || RuntimeConfig::resolve(args.db.clone(), args.settings.clone());

    match args.command {
        cli::Command::Init => {
            let config = config()?;
            library::open(&config.db_path)?;
            println!("Track library ready at {}", config.db_path.display());
        }
        cli::Command::Register { ref file } => {
            let records = read_records(file)?;
            let mut conn = library::open(&config()?.db_path)?;
            let inserted = library::register_tracks(&mut conn, &records)?;
            println!("Registered {} tracks ({inserted} new)", records.len());
        }
        cli::Command::Tracks => {
            let conn = library::open(&config()?.db_path)?;
            let tracks = library::list_tracks(&conn)?;
            if tracks.is_empty() {
                println!("No tracks registered yet.");
            }
            for track in tracks {
                println!("{}\t{track}", track.id);
            }
        }
        cli::Command::Playlist { ref action } => {
            let mut conn = library::open(&config()?.db_path)?;
            match action {
                PlaylistAction::Create { id, name } => {
                    library::create_playlist(&conn, id, name.as_deref().unwrap_or(id))?;
                    println!("Playlist `{id}' ready");
                }
                PlaylistAction::Add { id, tracks } => {
                    library::add_to_playlist(&mut conn, id, tracks)?;
                    println!("Added {} tracks to `{id}'", tracks.len());
                }
                PlaylistAction::Show { id } => {
                    let catalog = library::load_catalog(&conn, std::slice::from_ref(id))?;
                    for track in catalog.tracks() {
                        println!("{}\t{track}", track.id);
                    }
                }
            }
        }
        cli::Command::Zone { bpm } => {
            if !bpm.is_finite() || bpm <= 0.0 {
                bail!("Heart rate must be a positive number (got {bpm})");
            }
            let (zone, ideal) = zone::classify(bpm);
            println!("{bpm} bpm: {zone} zone, target tempo {ideal} BPM");
        }
        cli::Command::Run {
            ref playlists,
            script: ref script_path,
            transport,
        } => {
            let config = config()?;
            let conn = library::open(&config.db_path)?;
            let catalog = library::load_catalog(&conn, playlists)?;

            let text = fs::read_to_string(script_path).with_context(|| {
                format!("Failed to read session script {}", script_path.display())
            })?;
            let steps = script::parse(&text)?;

            match transport {
                Transport::Log => run_session(catalog, &config.engine, &steps, LogTransport)?,
                Transport::Mpc => {
                    run_session(catalog, &config.engine, &steps, MpcTransport::connect()?)?;
                }
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::print_completions(shell, &mut cmd);
        }
    }

    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<TrackRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read track file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Track file {} is not a JSON array of tracks", path.display()))
}

fn run_session<T>(
    catalog: Catalog,
    settings: &EngineSettings,
    steps: &[script::Step],
    transport: T,
) -> Result<()>
where
    T: PlaybackTransport + 'static,
{
    info!("Starting session over {} tracks", catalog.len());
    let queue = NavigationQueue::spawn(catalog, settings, transport)?;
    script::run(steps, &queue.handle())?;

    let summary = queue.finish()?.context("Session never started")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
