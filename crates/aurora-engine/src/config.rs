//! Analyzer configuration.
//!
//! All tunables live in one struct passed at construction and updatable via
//! `AudioAnalyzer::set_config`; the engine reads no ambient globals. Persists
//! to `<config_dir>/aurora/analyzer.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::smoother::NoteSmoothing;
use crate::error::EngineError;

/// Per-band absolute floors for beat detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatFloor {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl Default for BeatFloor {
    fn default() -> Self {
        Self {
            bass: 0.08,
            mid: 0.05,
            treble: 0.05,
        }
    }
}

/// Smoothing constants per channel. The ten color bands share one entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub bass: NoteSmoothing,
    pub mid: NoteSmoothing,
    pub treble: NoteSmoothing,
    pub color: NoteSmoothing,
    pub volume: NoteSmoothing,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        // Note fractions chosen so the resolved constants at 120 BPM land
        // near the millisecond fallbacks.
        Self {
            bass: NoteSmoothing::new(1.0 / 96.0, 1.0 / 12.0, 20.0, 150.0),
            mid: NoteSmoothing::new(1.0 / 192.0, 1.0 / 24.0, 10.0, 100.0),
            treble: NoteSmoothing::new(1.0 / 256.0, 1.0 / 32.0, 8.0, 80.0),
            color: NoteSmoothing::new(1.0 / 128.0, 1.0 / 16.0, 15.0, 120.0),
            volume: NoteSmoothing::new(1.0 / 96.0, 1.0 / 8.0, 20.0, 250.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub version: u32,
    /// Exponent applied to stereo band differences; below 1.0 emphasizes
    /// small channel imbalances.
    pub stereo_emphasis: f32,
    pub beat_floor: BeatFloor,
    /// Minimum frame-to-frame rise for a beat onset.
    pub dynamic_change_threshold: f32,
    /// Fraction of a peak surviving one second of decay.
    pub peak_decay_per_second: f32,
    /// Ripple ring propagation speed in radius units per second.
    pub ripple_speed: f32,
    /// Consumer-facing loudness toggle, carried into the snapshot.
    pub loudness_boost: bool,
    pub smoothing: SmoothingConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            stereo_emphasis: 0.7,
            beat_floor: BeatFloor::default(),
            dynamic_change_threshold: 0.07,
            peak_decay_per_second: 0.5,
            ripple_speed: 0.3,
            loudness_boost: false,
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from the default config path, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("failed to parse {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("failed to write {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("failed to serialize config: {e}"),
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.stereo_emphasis > 0.0 && self.stereo_emphasis.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "stereo_emphasis must be positive, got {}",
                self.stereo_emphasis
            )));
        }
        for (name, floor) in [
            ("bass", self.beat_floor.bass),
            ("mid", self.beat_floor.mid),
            ("treble", self.beat_floor.treble),
        ] {
            if !(0.0..=1.0).contains(&floor) {
                return Err(EngineError::InvalidConfig(format!(
                    "beat_floor.{name} must be in [0, 1], got {floor}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.dynamic_change_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "dynamic_change_threshold must be in [0, 1], got {}",
                self.dynamic_change_threshold
            )));
        }
        if !(self.peak_decay_per_second > 0.0 && self.peak_decay_per_second < 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "peak_decay_per_second must be in (0, 1), got {}",
                self.peak_decay_per_second
            )));
        }
        if !(self.ripple_speed > 0.0 && self.ripple_speed.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "ripple_speed must be positive, got {}",
                self.ripple_speed
            )));
        }
        Ok(())
    }

    fn config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("aurora").join("analyzer.json"))
    }
}
