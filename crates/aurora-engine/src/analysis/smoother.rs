//! Tempo-relative asymmetric exponential smoothing.
//!
//! Time constants are expressed as fractions of a whole note so responsiveness
//! tracks the current tempo estimate automatically; each falls back to a fixed
//! millisecond constant while no tempo is known.

use serde::{Deserialize, Serialize};

/// Floor for resolved time constants; keeps the exponential step finite.
const MIN_TAU: f32 = 1e-4;

/// Attack/release constants for one smoothed channel.
///
/// Note fractions are in whole notes (1.0 = four beats); fallbacks are in
/// milliseconds and used whenever the tempo estimate is zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoteSmoothing {
    pub attack_note: f32,
    pub release_note: f32,
    pub attack_fallback_ms: f32,
    pub release_fallback_ms: f32,
}

impl NoteSmoothing {
    pub const fn new(
        attack_note: f32,
        release_note: f32,
        attack_fallback_ms: f32,
        release_fallback_ms: f32,
    ) -> Self {
        Self {
            attack_note,
            release_note,
            attack_fallback_ms,
            release_fallback_ms,
        }
    }
}

/// Resolve a note fraction to a time constant in seconds.
///
/// A fraction of 1.0 is one whole note (four beats) at the given tempo.
/// With no tempo (`bpm == 0`), the millisecond fallback applies.
pub fn resolve_time_constant(note_fraction: f32, bpm: f32, fallback_ms: f32) -> f32 {
    if bpm > 0.0 {
        note_fraction * 4.0 * 60.0 / bpm
    } else {
        fallback_ms / 1000.0
    }
}

/// One exponential smoothing step with asymmetric time constants.
///
/// Uses `attack_tau` while the signal rises and `release_tau` while it falls.
/// Non-positive or non-finite `dt` is a no-op and returns `current` unchanged.
pub fn apply_smoothing(
    current: f32,
    target: f32,
    dt: f32,
    attack_tau: f32,
    release_tau: f32,
) -> f32 {
    if dt <= 0.0 || !dt.is_finite() {
        return current;
    }
    let tau = if target > current {
        attack_tau
    } else {
        release_tau
    };
    current + (target - current) * (1.0 - (-dt / tau.max(MIN_TAU)).exp())
}

/// Smoothed scalar state for one channel, driven by tempo-relative constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothedChannel {
    value: f32,
}

impl SmoothedChannel {
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Advance toward `target` by one frame and return the new value.
    pub fn update(&mut self, target: f32, dt: f32, bpm: f32, params: &NoteSmoothing) -> f32 {
        let attack = resolve_time_constant(params.attack_note, bpm, params.attack_fallback_ms);
        let release = resolve_time_constant(params.release_note, bpm, params.release_fallback_ms);
        self.value = apply_smoothing(self.value, target, dt, attack, release);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_fraction_resolves_against_tempo() {
        // Quarter note at 120 BPM = 0.5s.
        let tau = resolve_time_constant(0.25, 120.0, 100.0);
        assert!((tau - 0.5).abs() < 1e-6);
        // Whole note at 60 BPM = 4s.
        let tau = resolve_time_constant(1.0, 60.0, 100.0);
        assert!((tau - 4.0).abs() < 1e-6);
    }

    #[test]
    fn zero_tempo_uses_fallback() {
        let tau = resolve_time_constant(0.25, 0.0, 150.0);
        assert!((tau - 0.15).abs() < 1e-6);
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let mut current = 0.0f32;
        let mut prev = current;
        for _ in 0..200 {
            current = apply_smoothing(current, 1.0, 0.016, 0.05, 0.05);
            assert!(current >= prev, "must rise monotonically");
            assert!(current <= 1.0, "must never overshoot");
            prev = current;
        }
        assert!(current > 0.99);
    }

    #[test]
    fn asymmetric_constants_differ_in_response() {
        // Fast attack: a 0 -> 1 step is >95% converged within ~0.03s.
        let mut rising = 0.0f32;
        for _ in 0..3 {
            rising = apply_smoothing(rising, 1.0, 0.01, 0.01, 1.0);
        }
        assert!(rising > 0.95, "rising = {rising}");

        // Slow release: a 1 -> 0 step is still >50% unconverged at 0.03s.
        let mut falling = 1.0f32;
        for _ in 0..3 {
            falling = apply_smoothing(falling, 0.0, 0.01, 0.01, 1.0);
        }
        assert!(falling > 0.5, "falling = {falling}");
    }

    #[test]
    fn degenerate_dt_is_a_no_op() {
        for dt in [0.0, -0.016, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let out = apply_smoothing(0.4, 1.0, dt, 0.01, 0.01);
            assert_eq!(out, 0.4, "dt = {dt}");
        }
    }

    #[test]
    fn channel_tracks_target_and_resets() {
        let params = NoteSmoothing::new(0.01, 0.05, 10.0, 50.0);
        let mut ch = SmoothedChannel::default();
        for _ in 0..100 {
            ch.update(0.8, 0.016, 120.0, &params);
        }
        assert!((ch.value() - 0.8).abs() < 1e-3);
        ch.reset();
        assert_eq!(ch.value(), 0.0);
    }
}
