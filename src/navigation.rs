//! # Navigation Queue
//!
//! Every external event (user skips, heart-rate samples, cadence, transport
//! reports) becomes a [`Command`] on one channel. A single worker thread owns
//! the [`SessionState`] and applies commands one at a time, in arrival order,
//! so no two commands ever interleave their reads and writes.
//!
//! ## Guarantees
//!
//! - FIFO: a heart-rate sample sent after a skip is applied after that skip.
//! - [`NavigationHandle::drain`] returns once every command sent before it
//!   has been applied.
//! - Snapshots are taken between commands, never mid-mutation.
//! - After `Stop`, every later command is a logged no-op.
//! - Backward skips issued within the debounce window of the previous
//!   accepted one are absorbed.
//!
//! Transport calls made by the worker are fire-and-report, so the worker
//! never waits on the player.

use crate::config::EngineSettings;
use crate::playback::{PlaybackReport, PlaybackTransport, Reporter};
use crate::queue::Orchestrator;
use crate::session::{HeartRateSample, PlaybackStatus, SessionSnapshot, SessionState, SessionSummary};
use crate::track::{Catalog, Track};
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::ops::Deref;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A requested session transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    /// Skip forward, optionally selecting for an approximate heart rate
    /// instead of the latest sample.
    Next { approximate_heart_rate: Option<f64> },
    Previous,
    HeartRate(HeartRateSample),
    /// Steps per minute.
    Cadence(f64),
    /// Meters covered since the last report.
    Distance(f64),
    Pause,
    Resume,
    Stop,
    Playback(PlaybackReport),
}

/// A command stamped with the moment it was submitted.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub command: Command,
    pub issued_at: Instant,
}

impl Envelope {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            issued_at: Instant::now(),
        }
    }
}

/// Everything the worker can receive.
#[derive(Debug)]
pub(crate) enum Message {
    Apply(Envelope),
    Flush(Sender<()>),
    Snapshot(Sender<Option<SessionSnapshot>>),
    Summary(Sender<Option<SessionSummary>>),
    Shutdown,
}

/// Cloneable sender side of the queue. Safe to hand to sensor threads.
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: Sender<Message>,
}

impl NavigationHandle {
    fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow!("Navigation worker has shut down"))
    }

    /// Enqueue a command.
    ///
    /// # Errors
    ///
    /// Fails only if the worker thread is gone.
    pub fn submit(&self, command: Command) -> Result<()> {
        debug!("Enqueued {command:?}");
        self.send(Message::Apply(Envelope::new(command)))
    }

    pub fn start(&self) -> Result<()> {
        self.submit(Command::Start)
    }

    pub fn next(&self, approximate_heart_rate: Option<f64>) -> Result<()> {
        self.submit(Command::Next {
            approximate_heart_rate,
        })
    }

    pub fn previous(&self) -> Result<()> {
        self.submit(Command::Previous)
    }

    pub fn heart_rate(&self, bpm: f64) -> Result<()> {
        self.submit(Command::HeartRate(HeartRateSample::now(bpm)))
    }

    pub fn cadence(&self, steps_per_minute: f64) -> Result<()> {
        self.submit(Command::Cadence(steps_per_minute))
    }

    pub fn distance(&self, meters: f64) -> Result<()> {
        self.submit(Command::Distance(meters))
    }

    pub fn pause(&self) -> Result<()> {
        self.submit(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.submit(Command::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.submit(Command::Stop)
    }

    /// Block until everything enqueued so far has been applied.
    pub fn drain(&self) -> Result<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.send(Message::Flush(done_tx))?;
        done_rx
            .recv()
            .context("Navigation worker stopped before draining")
    }

    /// Session state after every command enqueued so far. `None` before start.
    pub fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Message::Snapshot(reply_tx))?;
        reply_rx
            .recv()
            .context("Navigation worker stopped before answering snapshot")
    }

    /// Run summary after every command enqueued so far. `None` before start.
    pub fn summary(&self) -> Result<Option<SessionSummary>> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Message::Summary(reply_tx))?;
        reply_rx
            .recv()
            .context("Navigation worker stopped before answering summary")
    }
}

/// Owner of the worker thread. Dropping it shuts the worker down.
#[derive(Debug)]
pub struct NavigationQueue {
    handle: NavigationHandle,
    worker: Option<JoinHandle<()>>,
}

impl NavigationQueue {
    /// Spawn a worker for one session over `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the thread cannot be
    /// spawned.
    pub fn spawn<T>(catalog: Catalog, settings: &EngineSettings, transport: T) -> Result<Self>
    where
        T: PlaybackTransport + 'static,
    {
        settings.validate()?;
        let (tx, rx) = mpsc::channel();

        let worker = Worker {
            orchestrator: Orchestrator::new(catalog, settings.scoring(), settings.start_strategy),
            session: None,
            transport,
            reporter: Reporter::new(tx.clone()),
            debounce: settings.debounce(),
            rotation_window: settings.rotation_window,
            last_previous: None,
        };

        let worker = thread::Builder::new()
            .name("navigation".to_string())
            .spawn(move || worker.run(rx))
            .context("Failed to spawn navigation worker")?;

        Ok(Self {
            handle: NavigationHandle { tx },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> NavigationHandle {
        self.handle.clone()
    }

    /// Stop the session, wait for the worker, and return the run summary.
    pub fn finish(mut self) -> Result<Option<SessionSummary>> {
        self.handle.stop()?;
        let summary = self.handle.summary()?;
        self.shutdown();
        Ok(summary)
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.send(Message::Shutdown);
            if worker.join().is_err() {
                warn!("Navigation worker panicked");
            }
        }
    }
}

impl Deref for NavigationQueue {
    type Target = NavigationHandle;

    fn deref(&self) -> &NavigationHandle {
        &self.handle
    }
}

impl Drop for NavigationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sole owner of the session state.
struct Worker<T: PlaybackTransport> {
    orchestrator: Orchestrator,
    session: Option<SessionState>,
    transport: T,
    reporter: Reporter,
    debounce: Duration,
    rotation_window: Option<usize>,
    /// Submit time of the last backward skip that moved the session,
    /// cleared by any forward skip.
    last_previous: Option<Instant>,
}

impl<T: PlaybackTransport> Worker<T> {
    fn run(mut self, rx: Receiver<Message>) {
        debug!("Navigation worker running");
        for message in rx {
            match message {
                Message::Apply(envelope) => self.apply(envelope),
                Message::Flush(done) => {
                    let _ = done.send(());
                }
                Message::Snapshot(reply) => {
                    let _ = reply.send(self.session.as_ref().map(SessionState::snapshot));
                }
                Message::Summary(reply) => {
                    let _ = reply.send(self.session.as_ref().map(SessionState::summary));
                }
                Message::Shutdown => break,
            }
        }
        debug!("Navigation worker exiting");
    }

    fn apply(&mut self, envelope: Envelope) {
        let Envelope { command, issued_at } = envelope;
        debug!("Applying {command:?}");

        if command == Command::Start {
            self.start_session();
            return;
        }

        let Some(state) = self.session.as_mut() else {
            debug!("No session started, ignoring {command:?}");
            return;
        };
        if state.is_stopped() {
            debug!("Session stopped, ignoring {command:?}");
            return;
        }

        match command {
            Command::Start => {}
            Command::Next {
                approximate_heart_rate,
            } => {
                self.last_previous = None;
                let chosen = self.orchestrator.commit_next(state, approximate_heart_rate);
                play(&mut self.transport, &self.reporter, state, chosen);
            }
            Command::Previous => {
                if let Some(last) = self.last_previous {
                    if issued_at.saturating_duration_since(last) < self.debounce {
                        debug!("Backward skip absorbed by debounce");
                        return;
                    }
                }

                match self.orchestrator.step_back(state) {
                    Some(track) => {
                        self.last_previous = Some(issued_at);
                        play(&mut self.transport, &self.reporter, state, Some(track));
                    }
                    None => debug!("Nothing to go back to"),
                }
            }
            Command::HeartRate(sample) => {
                state.record_heart_rate(sample);
                self.orchestrator.prequeue(state);
            }
            Command::Cadence(spm) => state.record_cadence(spm),
            Command::Distance(meters) => state.record_distance(meters),
            Command::Pause => {
                if state.status() == PlaybackStatus::Playing {
                    state.set_status(PlaybackStatus::Paused);
                    self.transport.pause(&self.reporter);
                }
            }
            Command::Resume => {
                if state.status() == PlaybackStatus::Paused && state.current().is_some() {
                    state.set_status(PlaybackStatus::Playing);
                    self.transport.resume(&self.reporter);
                }
            }
            Command::Stop => {
                let was_playing = state.status() == PlaybackStatus::Playing;
                state.stop();
                if was_playing {
                    self.transport.pause(&self.reporter);
                }
                info!(
                    "Session stopped after {:.1}s, {} tracks played",
                    state.elapsed().as_secs_f64(),
                    state.history().len()
                );
            }
            Command::Playback(report) => apply_report(state, report),
        }
    }

    fn start_session(&mut self) {
        if self.session.is_some() {
            debug!("Session already started, ignoring start");
            return;
        }

        let mut state = SessionState::new(self.orchestrator.catalog().len(), self.rotation_window);
        let opening = self.orchestrator.start(&mut state);
        play(&mut self.transport, &self.reporter, &mut state, opening);
        self.session = Some(state);
    }
}

/// Hand a newly current track to the transport.
fn play<T: PlaybackTransport>(
    transport: &mut T,
    reporter: &Reporter,
    state: &mut SessionState,
    track: Option<&Track>,
) {
    if let Some(track) = track {
        state.set_status(PlaybackStatus::Playing);
        transport.play(track, reporter);
    }
}

/// Status follows the commands; reports only confirm them, except for
/// failures, which pause the session until the runner acts.
fn apply_report(state: &mut SessionState, report: PlaybackReport) {
    match report {
        PlaybackReport::Started(id) if state.current() == Some(&id) => {
            state.set_transport_error(None);
        }
        PlaybackReport::Started(id) => debug!("Ignoring start report for stale track `{id}'"),
        PlaybackReport::Paused | PlaybackReport::Resumed => debug!("Transport confirmed {report:?}"),
        PlaybackReport::Failed { track, reason } => {
            if track.is_some() && track.as_ref() != state.current() {
                debug!("Ignoring failure for stale track: {reason}");
                return;
            }
            warn!("Playback failed: {reason}");
            state.set_status(PlaybackStatus::Paused);
            state.set_transport_error(Some(reason));
        }
    }
}
