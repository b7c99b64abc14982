//! # Session Scripts
//!
//! Plain-text files that drive a session from the command line, one event
//! per line:
//!
//! ```text
//! # warm up
//! hr 95
//! wait 500
//! cadence 160
//! next
//! hr 172
//! next 175
//! prev
//! distance 1200
//! pause
//! resume
//! stop
//! ```
//!
//! Blank lines and `#` comments are ignored. The runner opens the session
//! itself, so a script never needs a `start` line.

use crate::navigation::NavigationHandle;
use anyhow::{bail, Context, Result};
use log::debug;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// One line of a session script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    HeartRate(f64),
    Cadence(f64),
    Distance(f64),
    Next(Option<f64>),
    Previous,
    Pause,
    Resume,
    Wait(Duration),
    Stop,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::HeartRate(bpm) => write!(f, "hr {bpm}"),
            Step::Cadence(spm) => write!(f, "cadence {spm}"),
            Step::Distance(m) => write!(f, "distance {m}"),
            Step::Next(Some(bpm)) => write!(f, "next {bpm}"),
            Step::Next(None) => write!(f, "next"),
            Step::Previous => write!(f, "prev"),
            Step::Pause => write!(f, "pause"),
            Step::Resume => write!(f, "resume"),
            Step::Wait(d) => write!(f, "wait {}", d.as_millis()),
            Step::Stop => write!(f, "stop"),
        }
    }
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            bail!("empty line");
        };
        let argument = words.next();
        if let Some(extra) = words.next() {
            bail!("unexpected `{extra}' after `{keyword}'");
        }

        let step = match (keyword, argument) {
            ("hr", Some(arg)) => Step::HeartRate(positive(arg)?),
            ("cadence", Some(arg)) => Step::Cadence(non_negative(arg)?),
            ("distance", Some(arg)) => Step::Distance(non_negative(arg)?),
            ("next", arg) => Step::Next(arg.map(positive).transpose()?),
            ("prev", None) => Step::Previous,
            ("pause", None) => Step::Pause,
            ("resume", None) => Step::Resume,
            ("wait", Some(arg)) => Step::Wait(Duration::from_millis(
                arg.parse()
                    .with_context(|| format!("`{arg}' is not a whole number of milliseconds"))?,
            )),
            ("stop", None) => Step::Stop,
            ("hr" | "cadence" | "distance" | "wait", None) => {
                bail!("`{keyword}' needs a value")
            }
            ("prev" | "pause" | "resume" | "stop", Some(arg)) => {
                bail!("`{keyword}' takes no value (got `{arg}')")
            }
            (other, _) => bail!("unknown command `{other}'"),
        };
        Ok(step)
    }
}

fn number(arg: &str) -> Result<f64> {
    let value: f64 = arg
        .parse()
        .with_context(|| format!("`{arg}' is not a number"))?;
    if !value.is_finite() {
        bail!("`{arg}' is not a finite number");
    }
    Ok(value)
}

fn positive(arg: &str) -> Result<f64> {
    let value = number(arg)?;
    if value <= 0.0 {
        bail!("`{arg}' must be greater than zero");
    }
    Ok(value)
}

fn non_negative(arg: &str) -> Result<f64> {
    let value = number(arg)?;
    if value < 0.0 {
        bail!("`{arg}' must not be negative");
    }
    Ok(value)
}

/// Parse a whole script, reporting the first bad line by number.
pub fn parse(text: &str) -> Result<Vec<Step>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((i + 1, line))
        })
        .map(|(number, line)| {
            line.parse::<Step>()
                .with_context(|| format!("Script line {number}: `{line}'"))
        })
        .collect()
}

/// Open the session and feed it every step in order.
///
/// Returns once every step has been submitted; the caller decides when to
/// drain or finish the queue.
pub fn run(steps: &[Step], navigation: &NavigationHandle) -> Result<()> {
    navigation.start()?;
    for step in steps {
        debug!("Script: {step}");
        match *step {
            Step::HeartRate(bpm) => navigation.heart_rate(bpm)?,
            Step::Cadence(spm) => navigation.cadence(spm)?,
            Step::Distance(meters) => navigation.distance(meters)?,
            Step::Next(bpm) => navigation.next(bpm)?,
            Step::Previous => navigation.previous()?,
            Step::Pause => navigation.pause()?,
            Step::Resume => navigation.resume()?,
            Step::Wait(duration) => {
                // Let earlier commands land before the clock moves on.
                navigation.drain()?;
                thread::sleep(duration);
            }
            Step::Stop => navigation.stop()?,
        }
    }
    Ok(())
}
