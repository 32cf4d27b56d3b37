//! Audio analysis engine.
//!
//! Per-frame pipeline: band extraction -> volume/peak tracking ->
//! tempo-relative smoothing -> multi-band beat detection -> ripple events ->
//! output snapshot. Driven by one `update` call per rendered frame from a
//! single owner; all timestamps come from one caller-supplied monotonic
//! clock, in seconds.

pub mod bands;
pub mod beat;
pub mod frame;
pub mod ripple;
pub mod smoother;
pub mod snapshot;
pub mod volume;

pub use bands::{BandExtractor, BandKind, BandLevels, COLOR_BANDS};
pub use beat::{BeatState, BpmEstimator, MultiBandBeatDetector, RippleRequest};
pub use frame::{SpectrumFrame, WaveformFrame};
pub use ripple::{MAX_RIPPLES, Ripple, RippleTracker};
pub use smoother::{NoteSmoothing, SmoothedChannel, apply_smoothing, resolve_time_constant};
pub use snapshot::{
    AnalysisUniforms, BeatSnapshot, OutputSnapshot, RippleSlot, SmoothedLevels, TempoSnapshot,
};
pub use volume::{BandPeaks, VolumeTracker};

use crate::config::AnalyzerConfig;
use crate::error::EngineError;

/// Horizon past which the tempo-driving bass beat reads as expired.
const TEMPO_BEAT_EXPIRY_SECS: f64 = 2.0;

/// The analyzer instance: owns all per-frame state.
///
/// Single-writer: exactly one `update(..)` per rendered frame, then any
/// number of `snapshot(..)` reads. Given identical input sequences the
/// output is bit-identical; there is no hidden clock or randomness.
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    extractor: BandExtractor,
    volume: VolumeTracker,
    smoothed_bass: SmoothedChannel,
    smoothed_mid: SmoothedChannel,
    smoothed_treble: SmoothedChannel,
    smoothed_freq: [SmoothedChannel; COLOR_BANDS],
    beats: MultiBandBeatDetector,
    ripples: RippleTracker,
    levels: BandLevels,
    tempo_beat_age: f32,
}

impl AudioAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            extractor: BandExtractor::new(config.stereo_emphasis),
            volume: VolumeTracker::new(config.peak_decay_per_second),
            smoothed_bass: SmoothedChannel::default(),
            smoothed_mid: SmoothedChannel::default(),
            smoothed_treble: SmoothedChannel::default(),
            smoothed_freq: [SmoothedChannel::default(); COLOR_BANDS],
            beats: MultiBandBeatDetector::new(&config),
            ripples: RippleTracker::new(config.ripple_speed),
            levels: BandLevels::default(),
            tempo_beat_age: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Replace the configuration; analysis state is preserved.
    pub fn set_config(&mut self, config: AnalyzerConfig) {
        self.extractor.set_stereo_emphasis(config.stereo_emphasis);
        self.volume.set_decay_per_second(config.peak_decay_per_second);
        self.beats.apply_config(&config);
        self.ripples.set_speed(config.ripple_speed);
        self.config = config;
    }

    /// Apply an externally supplied tempo; see [`BpmEstimator::set_metadata_bpm`].
    pub fn set_metadata_bpm(&mut self, bpm: f32) -> Result<(), EngineError> {
        self.beats.tempo_mut().set_metadata_bpm(bpm)
    }

    /// Current tempo estimate in BPM (0 while unknown).
    pub fn bpm(&self) -> f32 {
        self.beats.tempo().bpm()
    }

    /// Advance the pipeline by one frame.
    ///
    /// `dt` is caller-computed seconds since the previous update; `now` is
    /// seconds on the caller's monotonic clock. Degenerate `dt` freezes the
    /// smoothed state rather than corrupting it.
    pub fn update(&mut self, spectrum: &SpectrumFrame, waveform: &WaveformFrame, dt: f32, now: f64) {
        self.levels = self.extractor.extract(spectrum);
        let bpm = self.beats.tempo().bpm();
        let smoothing = &self.config.smoothing;

        self.volume.update(waveform, dt, bpm, &smoothing.volume);
        self.smoothed_bass
            .update(self.levels.bass, dt, bpm, &smoothing.bass);
        self.smoothed_mid
            .update(self.levels.mid, dt, bpm, &smoothing.mid);
        self.smoothed_treble
            .update(self.levels.treble, dt, bpm, &smoothing.treble);
        for (channel, &target) in self.smoothed_freq.iter_mut().zip(&self.levels.freq) {
            channel.update(target, dt, bpm, &smoothing.color);
        }

        // Peaks feed the beat thresholds, so they advance first.
        self.volume
            .update_peaks(dt, self.levels.bass, self.levels.mid, self.levels.treble);

        for band in BandKind::ALL {
            if let Some(request) = self.beats.evaluate(band, &self.levels, self.volume.peaks(), now)
            {
                // Rejection by the rate limiter is a normal, silent outcome.
                self.ripples.try_spawn(&request);
            }
        }

        self.beats
            .observe_bass(self.levels.bass, self.smoothed_bass.value(), now);

        let last = self.beats.tempo().last_beat_time();
        self.tempo_beat_age = if last > 0.0 {
            let age = now - last;
            if age > TEMPO_BEAT_EXPIRY_SECS {
                0.0
            } else {
                age as f32
            }
        } else {
            0.0
        };
    }

    /// Build the output snapshot for the rendering layer.
    ///
    /// Read-time cleanup: expired ripples are pruned here so a stalled
    /// update loop cannot leak stale events; everything else is a pure read.
    pub fn snapshot(&mut self, now: f64) -> OutputSnapshot {
        self.ripples.prune(now);

        let tempo = self.beats.tempo();
        OutputSnapshot {
            bands: self.levels,
            smoothed: SmoothedLevels {
                bass: self.smoothed_bass.value(),
                mid: self.smoothed_mid.value(),
                treble: self.smoothed_treble.value(),
                freq: self.smoothed_freq.map(|c| c.value()),
                volume: self.volume.smoothed(),
            },
            peaks: *self.volume.peaks(),
            volume: self.volume.instant(),
            bass_beat: beat_snapshot(self.beats.state(BandKind::Bass)),
            mid_beat: beat_snapshot(self.beats.state(BandKind::Mid)),
            treble_beat: beat_snapshot(self.beats.state(BandKind::Treble)),
            tempo: TempoSnapshot {
                bpm: tempo.bpm(),
                metadata_bpm: tempo.metadata_bpm(),
                beat_age: self.tempo_beat_age,
            },
            loudness_boost: self.config.loudness_boost,
            live_ripples: self.ripples.len(),
            ripples: OutputSnapshot::pad_ripples(self.ripples.live(), now),
        }
    }

    /// Return every analysis channel to its initial zero state.
    pub fn reset(&mut self) {
        self.volume.reset();
        self.smoothed_bass.reset();
        self.smoothed_mid.reset();
        self.smoothed_treble.reset();
        for channel in &mut self.smoothed_freq {
            channel.reset();
        }
        self.beats.reset();
        self.ripples.reset();
        self.levels = BandLevels::default();
        self.tempo_beat_age = 0.0;
    }
}

fn beat_snapshot(state: &BeatState) -> BeatSnapshot {
    BeatSnapshot {
        age: state.beat_age,
        intensity: state.intensity,
        stereo_at_beat: state.stereo_at_beat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    const SR: f32 = 44100.0;
    const DT: f32 = 1.0 / 60.0;

    fn analyzer() -> AudioAnalyzer {
        AudioAnalyzer::new(AnalyzerConfig::default())
    }

    /// Spectrum with full-scale energy in the bass range only.
    fn bass_burst() -> Vec<u8> {
        let mut bins = vec![0u8; 1024];
        for bin in bins.iter_mut().take(12) {
            *bin = 255;
        }
        bins
    }

    fn quiet() -> Vec<u8> {
        vec![0u8; 1024]
    }

    fn step(analyzer: &mut AudioAnalyzer, bins: &[u8], waveform: &[u8], now: f64) {
        analyzer.update(
            &SpectrumFrame::mono(bins, SR),
            &WaveformFrame::new(waveform),
            DT,
            now,
        );
    }

    #[test]
    fn silence_is_idempotent_zero_output() {
        let mut analyzer = analyzer();
        let bins = quiet();
        let waveform = vec![128u8; 512];

        for i in 0..120 {
            step(&mut analyzer, &bins, &waveform, i as f64 * f64::from(DT));
        }
        let snapshot = analyzer.snapshot(2.0);

        assert_eq!(snapshot.bands, BandLevels::default());
        assert_eq!(snapshot.smoothed, SmoothedLevels::default());
        assert_eq!(snapshot.volume, 0.0);
        assert_eq!(snapshot.bass_beat.intensity, 0.0);
        assert_eq!(snapshot.mid_beat.intensity, 0.0);
        assert_eq!(snapshot.treble_beat.intensity, 0.0);
        assert_eq!(snapshot.tempo.bpm, 0.0);
        assert_eq!(snapshot.live_ripples, 0);
    }

    #[test]
    fn bass_onset_fires_beat_and_ripple() {
        let mut analyzer = analyzer();
        let waveform = vec![128u8; 512];

        step(&mut analyzer, &quiet(), &waveform, 0.0);
        step(&mut analyzer, &bass_burst(), &waveform, 0.02);

        let snapshot = analyzer.snapshot(0.02);
        assert_eq!(snapshot.bass_beat.intensity, 1.0);
        assert_eq!(snapshot.bass_beat.age, 0.0);
        assert_eq!(snapshot.live_ripples, 1);
        assert_eq!(snapshot.ripples[0].active, 1.0);
        // Bass geometry at full intensity.
        assert!((snapshot.ripples[0].max_radius - 0.88).abs() < 1e-6);
    }

    #[test]
    fn tempo_converges_on_periodic_bass() {
        let mut analyzer = analyzer();
        let waveform = vec![128u8; 512];
        let burst = bass_burst();
        let rest = quiet();

        // 120 BPM: one burst frame every 30 frames at 60 fps.
        for i in 0..600u32 {
            let bins = if i % 30 == 0 { &burst } else { &rest };
            step(&mut analyzer, bins, &waveform, f64::from(i) * f64::from(DT));
        }
        let bpm = analyzer.bpm();
        assert!((bpm - 120.0).abs() < 2.0, "bpm = {bpm}");
    }

    #[test]
    fn metadata_bpm_takes_precedence_end_to_end() {
        let mut analyzer = analyzer();
        analyzer.set_metadata_bpm(128.0).unwrap();

        let waveform = vec![128u8; 512];
        let burst = bass_burst();
        let rest = quiet();
        for i in 0..600u32 {
            let bins = if i % 30 == 0 { &burst } else { &rest };
            step(&mut analyzer, bins, &waveform, f64::from(i) * f64::from(DT));
        }
        assert_eq!(analyzer.bpm(), 128.0);
        assert_eq!(analyzer.snapshot(10.0).tempo.metadata_bpm, 128.0);
    }

    #[test]
    fn snapshot_is_pure_between_updates() {
        let mut analyzer = analyzer();
        let waveform = vec![200u8; 512];

        step(&mut analyzer, &quiet(), &waveform, 0.0);
        step(&mut analyzer, &bass_burst(), &waveform, 0.02);

        let a = analyzer.snapshot(0.02);
        let b = analyzer.snapshot(0.02);
        assert_eq!(a, b);

        // With only the clock advancing, ripple ages move; counts hold
        // while nothing has expired.
        let later = analyzer.snapshot(0.5);
        assert_eq!(later.live_ripples, a.live_ripples);
        assert!(later.ripples[0].age > a.ripples[0].age);
        assert_eq!(later.bands, a.bands);
        assert_eq!(later.smoothed, a.smoothed);
        assert_eq!(later.bass_beat, a.bass_beat);
    }

    #[test]
    fn snapshot_prunes_expired_ripples() {
        let mut analyzer = analyzer();
        let waveform = vec![128u8; 512];

        step(&mut analyzer, &quiet(), &waveform, 0.0);
        step(&mut analyzer, &bass_burst(), &waveform, 0.02);
        assert_eq!(analyzer.snapshot(0.02).live_ripples, 1);

        // Bass lifetime at full intensity is ~3.03s.
        let snapshot = analyzer.snapshot(3.2);
        assert_eq!(snapshot.live_ripples, 0);
        assert_eq!(snapshot.ripples[0], RippleSlot::zeroed());
    }

    #[test]
    fn degenerate_dt_freezes_smoothed_state() {
        let mut analyzer = analyzer();
        let waveform = vec![250u8; 512];

        for i in 0..30 {
            step(&mut analyzer, &bass_burst(), &waveform, i as f64 * f64::from(DT));
        }
        let before = analyzer.snapshot(0.5);

        analyzer.update(
            &SpectrumFrame::mono(&quiet(), SR),
            &WaveformFrame::new(&[128u8; 512]),
            0.0,
            0.51,
        );
        let after = analyzer.snapshot(0.51);
        assert_eq!(after.smoothed, before.smoothed);
        assert_eq!(after.peaks, before.peaks);
    }

    #[test]
    fn set_config_applies_without_clearing_state() {
        let mut analyzer = analyzer();
        let waveform = vec![200u8; 512];
        step(&mut analyzer, &quiet(), &waveform, 0.0);
        step(&mut analyzer, &bass_burst(), &waveform, 0.02);
        assert_eq!(analyzer.snapshot(0.02).live_ripples, 1);

        analyzer.set_config(AnalyzerConfig {
            loudness_boost: true,
            ..AnalyzerConfig::default()
        });

        let snapshot = analyzer.snapshot(0.03);
        assert!(snapshot.loudness_boost);
        assert_eq!(snapshot.live_ripples, 1);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut analyzer = analyzer();
        let waveform = vec![250u8; 512];
        for i in 0..60 {
            step(&mut analyzer, &bass_burst(), &waveform, i as f64 * f64::from(DT));
        }
        analyzer.reset();

        let snapshot = analyzer.snapshot(2.0);
        assert_eq!(snapshot.bands, BandLevels::default());
        assert_eq!(snapshot.smoothed, SmoothedLevels::default());
        assert_eq!(snapshot.peaks, BandPeaks::default());
        assert_eq!(snapshot.live_ripples, 0);
        assert_eq!(snapshot.tempo.bpm, 0.0);
    }

    #[test]
    fn beat_interval_floor_holds_through_the_pipeline() {
        let mut analyzer = analyzer();
        let waveform = vec![128u8; 512];
        let burst = bass_burst();
        let rest = quiet();

        // Alternate burst/rest every frame: onset train at ~33ms spacing.
        let mut now = 0.0f64;
        for i in 0..60u32 {
            let bins = if i % 2 == 0 { &burst } else { &rest };
            step(&mut analyzer, bins, &waveform, now);
            now += f64::from(DT);
        }
        // One second of onsets at a 160ms floor: at most 7 beats, so the
        // ripple pool has seen at most 7 creations.
        let snapshot = analyzer.snapshot(now);
        assert!(snapshot.live_ripples <= 7, "ripples = {}", snapshot.live_ripples);
    }
}
