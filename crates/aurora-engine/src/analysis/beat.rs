//! Multi-band beat detection and bass-driven tempo estimation.
//!
//! Each coarse band (bass/mid/treble) runs an independent onset detector
//! combining a peak-relative threshold, an absolute floor, a minimum
//! inter-beat interval, and a dynamic-change guard. A separate bass-only
//! detector drives the BPM estimate; the two bass paths are intentionally
//! independent (one feeds tempo, the other feeds visual ripples).
//!
//! All timestamps are seconds on the caller's single monotonic clock.

use super::bands::{BandKind, BandLevels};
use super::volume::BandPeaks;
use crate::config::AnalyzerConfig;
use crate::error::EngineError;

/// Minimum spacing between beats on one band. Caps the false-positive rate
/// at 375 BPM so noisy transients cannot spam downstream consumers.
const MIN_BEAT_INTERVAL: f64 = 0.160;

/// A beat older than this reads as expired: age and intensity drop to zero.
const BEAT_EXPIRY_SECS: f64 = 2.0;

/// Fraction of the running peak a value must clear to count as a beat.
const PEAK_THRESHOLD_RATIO: f32 = 0.85;

/// Gain applied to the raw level to produce beat intensity.
const INTENSITY_GAIN: f32 = 1.5;

/// Bass must exceed its smoothed value by this ratio to advance the tempo
/// estimate.
const TEMPO_RATIO: f32 = 1.4;

/// Absolute bass floor for the tempo detector.
const TEMPO_FLOOR: f32 = 0.15;

/// Accepted inter-beat interval range for tempo estimation: 30-600 BPM.
const TEMPO_INTERVAL_SECS: (f64, f64) = (0.1, 2.0);

/// Blend weights for folding a new instantaneous BPM into the estimate.
const TEMPO_KEEP: f32 = 0.7;
const TEMPO_TAKE: f32 = 0.3;

/// Upper bound on externally supplied metadata BPM.
const MAX_METADATA_BPM: f32 = 300.0;

/// Per-band beat state, surfaced unchanged in the output snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatState {
    /// Timestamp of the last detected beat; 0.0 means never.
    pub last_beat_time: f64,
    /// Seconds since the last beat, zeroed once the beat expires.
    pub beat_age: f32,
    /// Beat intensity in 0.0-1.0; zeroed once the beat expires.
    pub intensity: f32,
    /// Stereo balance frozen at detection time.
    pub stereo_at_beat: f32,
}

/// Request to spawn a ripple, emitted when a band fires.
#[derive(Debug, Clone, Copy)]
pub struct RippleRequest {
    pub band: BandKind,
    pub stereo: f32,
    pub intensity: f32,
    pub time: f64,
}

/// Onset detector for one band.
struct BandDetector {
    state: BeatState,
    prev_value: f32,
    min_threshold: f32,
}

impl BandDetector {
    fn new(min_threshold: f32) -> Self {
        Self {
            state: BeatState::default(),
            prev_value: 0.0,
            min_threshold,
        }
    }

    /// Evaluate one frame. Fires iff the value clears both the peak-relative
    /// threshold and the absolute floor, the minimum interval has elapsed,
    /// and the frame-to-frame rise exceeds the dynamic-change guard.
    fn evaluate(
        &mut self,
        band: BandKind,
        value: f32,
        stereo: f32,
        peak: f32,
        dynamic_change_threshold: f32,
        now: f64,
    ) -> Option<RippleRequest> {
        let dynamic_change = value - self.prev_value;
        self.prev_value = value;

        let threshold = (peak * PEAK_THRESHOLD_RATIO).max(self.min_threshold);
        let interval_ok = self.state.last_beat_time == 0.0
            || now - self.state.last_beat_time > MIN_BEAT_INTERVAL;

        if value > threshold
            && value > self.min_threshold
            && interval_ok
            && dynamic_change > dynamic_change_threshold
        {
            self.state.intensity = (value * INTENSITY_GAIN).min(1.0);
            self.state.stereo_at_beat = stereo;
            self.state.beat_age = 0.0;
            self.state.last_beat_time = now;
            return Some(RippleRequest {
                band,
                stereo,
                intensity: self.state.intensity,
                time: now,
            });
        }

        if self.state.last_beat_time > 0.0 {
            let age = now - self.state.last_beat_time;
            if age > BEAT_EXPIRY_SECS {
                self.state.beat_age = 0.0;
                self.state.intensity = 0.0;
            } else {
                self.state.beat_age = age as f32;
            }
        }
        None
    }

    fn reset(&mut self) {
        self.state = BeatState::default();
        self.prev_value = 0.0;
    }
}

/// Bass-driven BPM estimation with an authoritative metadata override.
pub struct BpmEstimator {
    estimated: f32,
    metadata: f32,
    last_beat_time: f64,
}

impl BpmEstimator {
    pub fn new() -> Self {
        Self {
            estimated: 0.0,
            metadata: 0.0,
            last_beat_time: 0.0,
        }
    }

    /// Feed one frame of bass level against its smoothed counterpart.
    ///
    /// While metadata BPM is set, bass beats still stamp the interval clock
    /// but never move the estimate.
    pub fn observe_bass(&mut self, bass: f32, smoothed_bass: f32, now: f64) {
        if bass <= smoothed_bass * TEMPO_RATIO || bass <= TEMPO_FLOOR {
            return;
        }
        if self.last_beat_time != 0.0 && now - self.last_beat_time <= MIN_BEAT_INTERVAL {
            return;
        }

        let prev = self.last_beat_time;
        self.last_beat_time = now;

        if self.metadata != 0.0 || prev == 0.0 {
            return;
        }
        let interval = now - prev;
        if interval < TEMPO_INTERVAL_SECS.0 || interval > TEMPO_INTERVAL_SECS.1 {
            return;
        }

        let instant = (60.0 / interval) as f32;
        self.estimated = if self.estimated > 0.0 {
            self.estimated * TEMPO_KEEP + instant * TEMPO_TAKE
        } else {
            instant
        };
    }

    /// Apply an externally supplied tempo. Valid range is `0 < bpm <= 300`;
    /// anything else is rejected, logged, and clears any previous override so
    /// estimation resumes.
    pub fn set_metadata_bpm(&mut self, bpm: f32) -> Result<(), EngineError> {
        if bpm.is_finite() && bpm > 0.0 && bpm <= MAX_METADATA_BPM {
            self.metadata = bpm;
            self.estimated = bpm;
            log::debug!("metadata BPM set to {bpm}");
            Ok(())
        } else {
            log::warn!("rejecting metadata BPM {bpm}: outside (0, {MAX_METADATA_BPM}]");
            self.metadata = 0.0;
            Err(EngineError::InvalidMetadataBpm(bpm))
        }
    }

    /// Current tempo estimate (metadata override included). Always >= 0.
    pub fn bpm(&self) -> f32 {
        self.estimated
    }

    pub fn metadata_bpm(&self) -> f32 {
        self.metadata
    }

    pub fn last_beat_time(&self) -> f64 {
        self.last_beat_time
    }

    pub fn reset(&mut self) {
        self.estimated = 0.0;
        self.metadata = 0.0;
        self.last_beat_time = 0.0;
    }
}

/// Per-band beat detection plus the aggregate bass tempo path.
pub struct MultiBandBeatDetector {
    bass: BandDetector,
    mid: BandDetector,
    treble: BandDetector,
    dynamic_change_threshold: f32,
    tempo: BpmEstimator,
}

impl MultiBandBeatDetector {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            bass: BandDetector::new(config.beat_floor.bass),
            mid: BandDetector::new(config.beat_floor.mid),
            treble: BandDetector::new(config.beat_floor.treble),
            dynamic_change_threshold: config.dynamic_change_threshold,
            tempo: BpmEstimator::new(),
        }
    }

    pub fn apply_config(&mut self, config: &AnalyzerConfig) {
        self.bass.min_threshold = config.beat_floor.bass;
        self.mid.min_threshold = config.beat_floor.mid;
        self.treble.min_threshold = config.beat_floor.treble;
        self.dynamic_change_threshold = config.dynamic_change_threshold;
    }

    /// Evaluate one band for this frame.
    pub fn evaluate(
        &mut self,
        band: BandKind,
        levels: &BandLevels,
        peaks: &BandPeaks,
        now: f64,
    ) -> Option<RippleRequest> {
        let value = levels.level(band);
        let stereo = levels.stereo(band);
        let peak = peaks.level(band);
        let guard = self.dynamic_change_threshold;
        self.detector_mut(band)
            .evaluate(band, value, stereo, peak, guard, now)
    }

    /// Advance the bass-only tempo path for this frame.
    pub fn observe_bass(&mut self, bass: f32, smoothed_bass: f32, now: f64) {
        self.tempo.observe_bass(bass, smoothed_bass, now);
    }

    pub fn state(&self, band: BandKind) -> &BeatState {
        &self.detector(band).state
    }

    pub fn tempo(&self) -> &BpmEstimator {
        &self.tempo
    }

    pub fn tempo_mut(&mut self) -> &mut BpmEstimator {
        &mut self.tempo
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
        self.tempo.reset();
    }

    fn detector(&self, band: BandKind) -> &BandDetector {
        match band {
            BandKind::Bass => &self.bass,
            BandKind::Mid => &self.mid,
            BandKind::Treble => &self.treble,
        }
    }

    fn detector_mut(&mut self, band: BandKind) -> &mut BandDetector {
        match band {
            BandKind::Bass => &mut self.bass,
            BandKind::Mid => &mut self.mid,
            BandKind::Treble => &mut self.treble,
        }
    }
}
