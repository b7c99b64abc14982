//! # Command-Line Interface Module
//!
//! Clap definitions for the `pulsetempo` binary.
//!
//! ## Commands
//!
//! - `init`: create the track library
//! - `register`: import tracks (with BPM analysis results) from JSON
//! - `tracks`: list the library
//! - `playlist`: create, fill, and show playlists
//! - `zone`: classify a heart rate
//! - `run`: play a scripted session over the selected playlists
//!
//! ## Examples
//!
//! ```bash
//! pulsetempo register analysed.json
//! pulsetempo playlist create tempo "Tempo run"
//! pulsetempo playlist add tempo track-01 track-07
//! pulsetempo run --playlist tempo --script intervals.txt --transport mpc
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Where `run` sends playback requests.
#[derive(Copy, Clone, Default, PartialEq, Eq, ValueEnum, Debug)]
pub enum Transport {
    /// Only log what would play
    #[default]
    Log,
    /// Control MPD through the `mpc` client
    Mpc,
}

#[derive(Parser)]
#[command(name = "pulsetempo")]
#[command(about = "PulseTempo: music that keeps pace with your heart rate")]
#[command(version)]
pub struct Args {
    /// Track library database
    #[arg(long, global = true, env = "PULSETEMPO_DB")]
    pub db: Option<PathBuf>,

    /// Engine settings file (JSON)
    #[arg(long, global = true, env = "PULSETEMPO_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the track library if it does not exist
    Init,

    /// Register tracks from a JSON file
    ///
    /// The file holds an array of objects with `id`, `title`, `artist` and
    /// optional `bpm`, `confidence`, `duration_secs` and `source`. Known
    /// tracks only take the new BPM when it is more trusted.
    Register {
        /// JSON file of track records
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },

    /// List all tracks in the library
    Tracks,

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Show the effort zone and target tempo for a heart rate
    Zone {
        /// Heart rate in beats per minute
        bpm: f64,
    },

    /// Run a scripted session and print its summary as JSON
    Run {
        /// Playlist to draw tracks from (repeatable)
        #[arg(short, long = "playlist", required = true)]
        playlists: Vec<String>,

        /// Session script (`hr`, `next`, `prev`, `wait`, ...)
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        script: PathBuf,

        #[arg(short, long, value_enum, default_value_t)]
        transport: Transport,
    },

    /// Generate shell completions
    ///
    /// Usage: pulsetempo completion bash > ~/.local/share/bash-completion/completions/pulsetempo
    Completion {
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistAction {
    /// Create (or rename) a playlist
    Create {
        id: String,
        /// Display name, defaults to the id
        name: Option<String>,
    },
    /// Append registered tracks to a playlist
    Add {
        id: String,
        #[arg(required = true)]
        tracks: Vec<String>,
    },
    /// List the tracks of a playlist in order
    Show {
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_run_takes_several_playlists() {
        let args = Args::try_parse_from([
            "pulsetempo", "run", "-p", "easy", "--playlist", "hard", "--script", "s.txt",
        ])
        .unwrap();
        match args.command {
            Command::Run { playlists, transport, .. } => {
                assert_eq!(playlists, vec!["easy", "hard"]);
                assert_eq!(transport, Transport::Log);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_a_playlist() {
        assert!(Args::try_parse_from(["pulsetempo", "run", "--script", "s.txt"]).is_err());
    }
}
