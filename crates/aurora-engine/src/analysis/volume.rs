//! Volume tracking: instantaneous level, tempo-smoothed level, and
//! peak-with-decay values used as dynamic beat-detection thresholds.

use super::bands::BandKind;
use super::frame::WaveformFrame;
use super::smoother::{NoteSmoothing, SmoothedChannel};

/// Decaying peak per coarse band plus overall volume.
///
/// Peaks snap up to new highs instantly and decay exponentially otherwise,
/// so they always sit at or above the current reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandPeaks {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub volume: f32,
}

impl BandPeaks {
    pub fn level(&self, kind: BandKind) -> f32 {
        match kind {
            BandKind::Bass => self.bass,
            BandKind::Mid => self.mid,
            BandKind::Treble => self.treble,
        }
    }
}

/// Tracks instantaneous and smoothed volume plus per-band peaks.
pub struct VolumeTracker {
    instant: f32,
    smoothed: SmoothedChannel,
    peaks: BandPeaks,
    /// Fraction of a peak surviving after one second of decay.
    decay_per_second: f32,
}

impl VolumeTracker {
    pub fn new(decay_per_second: f32) -> Self {
        Self {
            instant: 0.0,
            smoothed: SmoothedChannel::default(),
            peaks: BandPeaks::default(),
            decay_per_second,
        }
    }

    pub fn set_decay_per_second(&mut self, decay: f32) {
        self.decay_per_second = decay;
    }

    /// Peak-centered deviation metric: max absolute distance from the 128
    /// midpoint, normalized to 0.0-1.0. Empty input reads as silence.
    pub fn instant_volume(waveform: &WaveformFrame) -> f32 {
        let peak = waveform
            .samples
            .iter()
            .map(|&s| (i16::from(s) - 128).unsigned_abs())
            .max()
            .unwrap_or(0);
        f32::from(peak) / 128.0
    }

    /// Recompute instantaneous volume and advance the smoothed value.
    pub fn update(&mut self, waveform: &WaveformFrame, dt: f32, bpm: f32, params: &NoteSmoothing) {
        self.instant = Self::instant_volume(waveform);
        self.smoothed.update(self.instant, dt, bpm, params);
    }

    /// Advance all peaks: `peak = max(value, peak * decay^dt)`.
    pub fn update_peaks(&mut self, dt: f32, bass: f32, mid: f32, treble: f32) {
        let factor = if dt > 0.0 && dt.is_finite() {
            self.decay_per_second.powf(dt)
        } else {
            1.0
        };
        self.peaks.bass = bass.max(self.peaks.bass * factor);
        self.peaks.mid = mid.max(self.peaks.mid * factor);
        self.peaks.treble = treble.max(self.peaks.treble * factor);
        self.peaks.volume = self.instant.max(self.peaks.volume * factor);
    }

    pub fn instant(&self) -> f32 {
        self.instant
    }

    pub fn smoothed(&self) -> f32 {
        self.smoothed.value()
    }

    pub fn peaks(&self) -> &BandPeaks {
        &self.peaks
    }

    pub fn reset(&mut self) {
        self.instant = 0.0;
        self.smoothed.reset();
        self.peaks = BandPeaks::default();
    }
}
