//! Music that keeps pace with a runner's heart rate.
//!
//! Core modules:
//! - [`track`] - Tracks and the session catalog
//! - [`zone`] - Heart-rate effort zones and their target tempos
//! - [`algorithm`] - Tempo-fit and variety scoring
//! - [`queue`] - Track decisions (opening pick, pre-queue, skips)
//! - [`navigation`] - Serialized command processing on one worker thread
//! - [`session`] - Session state, snapshots, and run summaries
//! - [`playback`] - Fire-and-report transports (`mpc`, logging)
//!
//! ### Supporting Modules
//!
//! - [`library`] - SQLite track library and playlists
//! - [`config`] - Data directory and engine settings
//! - [`script`] - Session scripts for the CLI
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use pulsetempo::config::EngineSettings;
//! use pulsetempo::navigation::NavigationQueue;
//! use pulsetempo::playback::LogTransport;
//! use pulsetempo::track::{Catalog, Track};
//!
//! let catalog = Catalog::new(vec![
//!     Track::with_tempo("steady", Some(150)),
//!     Track::with_tempo("easy", Some(100)),
//! ]);
//! let session = NavigationQueue::spawn(catalog, &EngineSettings::default(), LogTransport)?;
//!
//! session.start()?;          // opens with "easy", the resting match
//! session.heart_rate(148.0)?; // pre-queues "steady"
//! session.next(None)?;        // switches to "steady"
//!
//! let summary = session.finish()?;
//! println!("{summary:?}");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Selection
//!
//! A heart rate maps to one of four zones, each with a target tempo
//! (100, 130, 150, 170 BPM). Every candidate gets
//!
//! ```text
//! score = 0.7 * tempo_fit + 0.3 * variety
//! ```
//!
//! where `tempo_fit` falls from 1.0 at the target to a small floor 50 BPM
//! away, and `variety` halves for tracks already played in the current
//! rotation. The tempo weight always dominates, so variety only breaks
//! near-ties. Tracks without a measured tempo are a last resort.
//!
//! ## Error Handling
//!
//! Fallible operations return `anyhow::Result`. Selection itself never
//! fails: an empty catalog simply never selects anything, and commands
//! that make no sense in the current state are logged and ignored.

pub mod algorithm;
pub mod cli;
pub mod completion;
pub mod config;
pub mod library;
pub mod navigation;
pub mod playback;
pub mod queue;
pub mod script;
pub mod session;
pub mod track;
pub mod zone;
