//! Per-frame output snapshot.
//!
//! The snapshot is the sole contract between the analyzer and the rendering
//! layer: rebuilt on every call, never mutated by consumers. The GPU-facing
//! views are `#[repr(C)]` Pod structs uploaded verbatim as uniform data; keep
//! them in sync with the shader-side declarations.

use bytemuck::{Pod, Zeroable};

use super::bands::{BandLevels, COLOR_BANDS};
use super::ripple::{MAX_RIPPLES, Ripple};
use super::volume::BandPeaks;

/// Smoothed levels for every channel the analyzer tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub freq: [f32; COLOR_BANDS],
    pub volume: f32,
}

/// Per-band beat view frozen into the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeatSnapshot {
    pub age: f32,
    pub intensity: f32,
    pub stereo_at_beat: f32,
}

/// Tempo view: the running estimate, the metadata override, and the age of
/// the last tempo-driving bass beat (capped at 2s, like band beats).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TempoSnapshot {
    pub bpm: f32,
    pub metadata_bpm: f32,
    pub beat_age: f32,
}

/// Padded per-ripple record. The array always has [`MAX_RIPPLES`] entries;
/// slots past `live_ripples` are zeroed, with `active` at 0.0. Twelve floats
/// per slot: three vec4s in the uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct RippleSlot {
    pub center: [f32; 2],
    pub age: f32,
    pub intensity: f32,
    pub width: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub intensity_mult: f32,
    pub active: f32,
    pub _pad: [f32; 3],
}

impl RippleSlot {
    fn from_ripple(ripple: &Ripple, now: f64) -> Self {
        Self {
            center: [ripple.center_x, ripple.center_y],
            age: ripple.age(now),
            intensity: ripple.intensity,
            width: ripple.width,
            min_radius: ripple.min_radius,
            max_radius: ripple.max_radius,
            intensity_mult: ripple.intensity_mult,
            active: 1.0,
            _pad: [0.0; 3],
        }
    }
}

/// Read-only aggregate of one frame of analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSnapshot {
    /// Raw band levels for this frame.
    pub bands: BandLevels,
    pub smoothed: SmoothedLevels,
    pub peaks: BandPeaks,
    /// Instantaneous (unsmoothed) volume.
    pub volume: f32,
    pub bass_beat: BeatSnapshot,
    pub mid_beat: BeatSnapshot,
    pub treble_beat: BeatSnapshot,
    pub tempo: TempoSnapshot,
    /// Consumer-facing loudness toggle carried through from the config.
    pub loudness_boost: bool,
    pub live_ripples: usize,
    pub ripples: [RippleSlot; MAX_RIPPLES],
}

impl OutputSnapshot {
    /// Build the padded ripple array from the live pool.
    pub(crate) fn pad_ripples(live: &[Ripple], now: f64) -> [RippleSlot; MAX_RIPPLES] {
        let mut slots = [RippleSlot::zeroed(); MAX_RIPPLES];
        for (slot, ripple) in slots.iter_mut().zip(live) {
            *slot = RippleSlot::from_ripple(ripple, now);
        }
        slots
    }

    /// Scalar fields packed for direct uniform upload.
    pub fn uniforms(&self) -> AnalysisUniforms {
        let mut freq = [0.0f32; 12];
        freq[..COLOR_BANDS].copy_from_slice(&self.smoothed.freq);
        AnalysisUniforms {
            bass: self.smoothed.bass,
            mid: self.smoothed.mid,
            treble: self.smoothed.treble,
            volume: self.smoothed.volume,
            bass_peak: self.peaks.bass,
            mid_peak: self.peaks.mid,
            treble_peak: self.peaks.treble,
            volume_peak: self.peaks.volume,
            bass_beat: self.bass_beat.intensity,
            mid_beat: self.mid_beat.intensity,
            treble_beat: self.treble_beat.intensity,
            bpm: self.tempo.bpm,
            bass_stereo: self.bands.bass_stereo,
            mid_stereo: self.bands.mid_stereo,
            treble_stereo: self.bands.treble_stereo,
            live_ripples: self.live_ripples as f32,
            freq,
        }
    }

    /// The padded ripple array is already Pod; upload it verbatim.
    pub fn ripple_uniforms(&self) -> &[RippleSlot; MAX_RIPPLES] {
        &self.ripples
    }
}

/// Scalar snapshot fields packed for GPU consumption (112 bytes).
/// Must be kept in sync with the shader-side uniform struct.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct AnalysisUniforms {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub volume: f32,
    // 16 bytes

    pub bass_peak: f32,
    pub mid_peak: f32,
    pub treble_peak: f32,
    pub volume_peak: f32,
    // 32 bytes

    pub bass_beat: f32,
    pub mid_beat: f32,
    pub treble_beat: f32,
    pub bpm: f32,
    // 48 bytes

    pub bass_stereo: f32,
    pub mid_stereo: f32,
    pub treble_stereo: f32,
    pub live_ripples: f32,
    // 64 bytes

    // Ten color bands padded to three vec4s.
    pub freq: [f32; 12],
    // 48 bytes (112 total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::bands::BandKind;
    use crate::analysis::beat::RippleRequest;
    use crate::analysis::ripple::RippleTracker;

    #[test]
    fn uniform_sizes_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<AnalysisUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<RippleSlot>(), 48);
        assert_eq!(std::mem::size_of::<AnalysisUniforms>(), 112);
    }

    #[test]
    fn padded_array_zeroes_unused_slots() {
        let mut tracker = RippleTracker::new(0.3);
        tracker.try_spawn(&RippleRequest {
            band: BandKind::Bass,
            stereo: 0.4,
            intensity: 1.0,
            time: 1.0,
        });
        let slots = OutputSnapshot::pad_ripples(tracker.live(), 1.5);

        assert_eq!(slots[0].active, 1.0);
        assert!((slots[0].age - 0.5).abs() < 1e-6);
        assert!((slots[0].center[0] - 0.2).abs() < 1e-6);
        for slot in &slots[1..] {
            assert_eq!(*slot, RippleSlot::zeroed());
        }
    }

    #[test]
    fn freq_uniforms_carry_all_color_bands() {
        let mut snapshot_smoothed = SmoothedLevels::default();
        for (i, f) in snapshot_smoothed.freq.iter_mut().enumerate() {
            *f = i as f32 * 0.1;
        }
        let snapshot = OutputSnapshot {
            bands: BandLevels::default(),
            smoothed: snapshot_smoothed,
            peaks: BandPeaks::default(),
            volume: 0.0,
            bass_beat: BeatSnapshot::default(),
            mid_beat: BeatSnapshot::default(),
            treble_beat: BeatSnapshot::default(),
            tempo: TempoSnapshot::default(),
            loudness_boost: false,
            live_ripples: 0,
            ripples: [RippleSlot::zeroed(); MAX_RIPPLES],
        };
        let uniforms = snapshot.uniforms();
        for i in 0..COLOR_BANDS {
            assert!((uniforms.freq[i] - i as f32 * 0.1).abs() < 1e-6);
        }
        assert_eq!(uniforms.freq[10], 0.0);
        assert_eq!(uniforms.freq[11], 0.0);
    }
}
