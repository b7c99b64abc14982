//! # Playback Transport
//!
//! The engine never plays audio itself. It tells a [`PlaybackTransport`] to
//! play, pause, or resume, and carries on. Transports are fire-and-report:
//! they must return immediately and deliver the outcome later through the
//! [`Reporter`] they were handed, which feeds it back into the navigation
//! queue like any other command.
//!
//! Two transports ship with the crate:
//!
//! - [`MpcTransport`] drives MPD through the `mpc` command-line client from
//!   its own worker thread. The track id is used as the MPD URI.
//! - [`LogTransport`] only logs, and reports every request as successful.

use crate::navigation::{Command, Envelope, Message};
use crate::track::{Track, TrackId};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::process;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Outcome of a transport request, delivered asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackReport {
    Started(TrackId),
    Paused,
    Resumed,
    Failed {
        track: Option<TrackId>,
        reason: String,
    },
}

/// Handle a transport uses to report back into the navigation queue.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Sender<Message>,
}

impl Reporter {
    pub(crate) fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Queue a report. Reports sent after the queue shut down are dropped.
    pub fn report(&self, report: PlaybackReport) {
        let message = Message::Apply(Envelope::new(Command::Playback(report)));
        if self.tx.send(message).is_err() {
            debug!("Navigation queue gone, dropping playback report");
        }
    }
}

/// What the engine needs from a music player.
pub trait PlaybackTransport: Send {
    /// Start `track` from the beginning.
    fn play(&mut self, track: &Track, reporter: &Reporter);
    fn pause(&mut self, reporter: &Reporter);
    fn resume(&mut self, reporter: &Reporter);
}

/// Transport that only logs.
#[derive(Debug, Default)]
pub struct LogTransport;

impl PlaybackTransport for LogTransport {
    fn play(&mut self, track: &Track, reporter: &Reporter) {
        info!("Now playing {track}");
        reporter.report(PlaybackReport::Started(track.id.clone()));
    }

    fn pause(&mut self, reporter: &Reporter) {
        info!("Playback paused");
        reporter.report(PlaybackReport::Paused);
    }

    fn resume(&mut self, reporter: &Reporter) {
        info!("Playback resumed");
        reporter.report(PlaybackReport::Resumed);
    }
}

/// A request waiting for the `mpc` worker.
#[derive(Debug)]
enum Request {
    Play(TrackId),
    Pause,
    Resume,
}

/// Transport that shells out to `mpc`.
///
/// Requests go through one worker thread in the order they were made, so a
/// later skip can never reach MPD before an earlier one. Dropping the
/// transport waits for queued requests to finish.
#[derive(Debug)]
pub struct MpcTransport {
    requests: Option<Sender<(Request, Reporter)>>,
    worker: Option<JoinHandle<()>>,
}

impl MpcTransport {
    /// Check that `mpc` is installed and MPD answers.
    ///
    /// # Errors
    ///
    /// Returns an error if `mpc` cannot be executed, MPD is unreachable, or
    /// the worker thread cannot be spawned.
    pub fn connect() -> Result<Self> {
        run_mpc(&["version"]).context("Cannot reach MPD through mpc")?;
        Self::with_runner(run_mpc)
    }

    /// Worker that hands each `mpc` argument list to `run`.
    fn with_runner<F>(mut run: F) -> Result<Self>
    where
        F: FnMut(&[&str]) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<(Request, Reporter)>();
        let worker = thread::Builder::new()
            .name("mpc".to_string())
            .spawn(move || {
                for (request, reporter) in rx {
                    reporter.report(execute(&mut run, request));
                }
                debug!("mpc worker exiting");
            })
            .context("Failed to spawn mpc worker")?;

        Ok(Self {
            requests: Some(tx),
            worker: Some(worker),
        })
    }

    fn send(&self, request: Request, reporter: &Reporter) {
        let Some(requests) = &self.requests else {
            return;
        };
        if requests.send((request, reporter.clone())).is_err() {
            warn!("mpc worker is gone, dropping request");
        }
    }
}

impl PlaybackTransport for MpcTransport {
    fn play(&mut self, track: &Track, reporter: &Reporter) {
        info!("Sending {track} to MPD");
        self.send(Request::Play(track.id.clone()), reporter);
    }

    fn pause(&mut self, reporter: &Reporter) {
        self.send(Request::Pause, reporter);
    }

    fn resume(&mut self, reporter: &Reporter) {
        self.send(Request::Resume, reporter);
    }
}

impl Drop for MpcTransport {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("mpc worker panicked");
            }
        }
    }
}

fn execute<F>(run: &mut F, request: Request) -> PlaybackReport
where
    F: FnMut(&[&str]) -> Result<()>,
{
    let (name, result, track) = match request {
        Request::Play(id) => {
            let result = run(&["clear"])
                .and_then(|()| run(&["add", id.as_str()]))
                .and_then(|()| run(&["play"]));
            ("play", result.map(|()| PlaybackReport::Started(id.clone())), Some(id))
        }
        Request::Pause => ("pause", run(&["pause"]).map(|()| PlaybackReport::Paused), None),
        Request::Resume => ("resume", run(&["play"]).map(|()| PlaybackReport::Resumed), None),
    };

    result.unwrap_or_else(|e| {
        warn!("mpc {name} failed: {e:#}");
        PlaybackReport::Failed {
            track,
            reason: format!("{e:#}"),
        }
    })
}

/// Run one `mpc` invocation, failing on a non-zero exit.
fn run_mpc(args: &[&str]) -> Result<()> {
    debug!("mpc {}", args.join(" "));
    let output = process::Command::new("mpc")
        .args(args)
        .output()
        .context("Failed to execute mpc command. Please install mpc (MPD client)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("mpc {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(())
}
