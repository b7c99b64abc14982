//! # Configuration Module
//!
//! Data directory setup and engine settings.
//!
//! ## Data Storage
//!
//! PulseTempo keeps its track library and optional settings file in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/pulsetempo/`
//! - macOS: `~/Library/Application Support/pulsetempo/`
//! - Windows: `%APPDATA%\pulsetempo\`
//!
//! ## Settings File
//!
//! `settings.json` in the data directory (or any path given with
//! `--settings`). Every field is optional:
//!
//! ```json
//! {
//!   "debounce_ms": 300,
//!   "tempo_weight": 0.7,
//!   "variety_weight": 0.3,
//!   "tempo_falloff_bpm": 50.0,
//!   "start_strategy": "resting",
//!   "rotation_window": null
//! }
//! ```

use crate::algorithm::ScoringContext;
use crate::queue::StartStrategy;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The pulsetempo subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let app_dir = data_dir.join("pulsetempo");
    fs::create_dir_all(&app_dir)
        .with_context(|| format!(
            "Failed to create PulseTempo data directory at {}. Please check file permissions.",
            app_dir.display()
        ))?;

    Ok(app_dir)
}

/// Returns the default track library path.
///
/// # Examples
///
/// ```no_run
/// use pulsetempo::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Library location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("library.db"))
}

/// Returns the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Tunables for the selection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Backward skips closer together than this collapse into one.
    pub debounce_ms: u64,
    pub tempo_weight: f64,
    pub variety_weight: f64,
    pub tempo_falloff_bpm: f64,
    pub start_strategy: StartStrategy,
    /// Cap on the rotation window. Defaults to the catalog size.
    pub rotation_window: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let scoring = ScoringContext::default();
        Self {
            debounce_ms: 300,
            tempo_weight: scoring.tempo_weight,
            variety_weight: scoring.variety_weight,
            tempo_falloff_bpm: scoring.tempo_falloff_bpm,
            start_strategy: StartStrategy::default(),
            rotation_window: None,
        }
    }
}

impl EngineSettings {
    /// Load settings from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate()?;
        debug!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    /// Reject settings that would break the scoring guarantees.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tempo_weight", self.tempo_weight),
            ("variety_weight", self.variety_weight),
            ("tempo_falloff_bpm", self.tempo_falloff_bpm),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("Setting `{name}' must be a finite, non-negative number (got {value})");
            }
        }
        if self.tempo_weight <= self.variety_weight {
            bail!(
                "`tempo_weight' ({}) must be greater than `variety_weight' ({})",
                self.tempo_weight,
                self.variety_weight
            );
        }
        if self.tempo_falloff_bpm == 0.0 {
            bail!("`tempo_falloff_bpm' must be greater than zero");
        }
        Ok(())
    }

    pub fn scoring(&self) -> ScoringContext {
        ScoringContext {
            tempo_weight: self.tempo_weight,
            variety_weight: self.variety_weight,
            tempo_falloff_bpm: self.tempo_falloff_bpm,
            ..ScoringContext::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub engine: EngineSettings,
}

impl RuntimeConfig {
    /// Resolve paths (explicit ones win over the data directory) and load
    /// the engine settings.
    pub fn resolve(db_path: Option<PathBuf>, settings_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        let settings_path = match settings_path {
            Some(path) => path,
            None => get_settings_path()?,
        };

        Ok(Self {
            db_path,
            engine: EngineSettings::load(&settings_path)?,
        })
    }
}
