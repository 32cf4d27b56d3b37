//! Offline demo driver.
//!
//! Synthesizes a few seconds of spectrum/waveform frames with bass kicks at
//! a known tempo and logs what the engine detects: per-band beats, tempo
//! convergence, and live ripple counts. Useful for eyeballing detector
//! behavior without an audio device or renderer attached.

use anyhow::Result;
use aurora_engine::analysis::{AudioAnalyzer, SpectrumFrame, WaveformFrame};
use aurora_engine::config::AnalyzerConfig;

const SAMPLE_RATE: f32 = 44100.0;
const BINS: usize = 1024;
const FPS: f64 = 60.0;
const RUN_SECONDS: f64 = 10.0;
const KICK_BPM: f64 = 124.0;
const KICK_LENGTH_SECS: f64 = 0.06;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AnalyzerConfig::load();
    config.validate()?;
    let mut analyzer = AudioAnalyzer::new(config);

    log::info!("synthesizing {RUN_SECONDS}s at {FPS} fps with kicks at {KICK_BPM} BPM");

    let dt = 1.0 / FPS;
    let frames = (RUN_SECONDS * FPS) as u32;
    let beat_period = 60.0 / KICK_BPM;

    let mut combined = vec![0u8; BINS];
    let mut left = vec![0u8; BINS];
    let mut right = vec![0u8; BINS];
    let mut waveform = vec![128u8; 512];
    let mut bass_beats = 0u32;

    for i in 0..frames {
        let now = f64::from(i) * dt;
        synthesize_frame(
            now,
            beat_period,
            &mut combined,
            &mut left,
            &mut right,
            &mut waveform,
        );

        let spectrum = SpectrumFrame {
            combined: &combined,
            left: &left,
            right: &right,
            sample_rate: SAMPLE_RATE,
        };
        analyzer.update(&spectrum, &WaveformFrame::new(&waveform), dt as f32, now);

        let snapshot = analyzer.snapshot(now);
        // Beat age is zeroed exactly on the detection frame.
        if snapshot.bass_beat.age == 0.0 && snapshot.bass_beat.intensity > 0.0 {
            bass_beats += 1;
            log::info!(
                "t={now:5.2}s  bass beat  intensity={:.2}  bpm={:6.1}  ripples={}",
                snapshot.bass_beat.intensity,
                snapshot.tempo.bpm,
                snapshot.live_ripples,
            );
        }
    }

    let snapshot = analyzer.snapshot(RUN_SECONDS);
    log::info!(
        "done: {bass_beats} bass beats, estimated {:.1} BPM (expected {KICK_BPM}), {} live ripples",
        analyzer.bpm(),
        snapshot.live_ripples,
    );
    Ok(())
}

/// One frame of synthetic audio: a steady mid/treble pad, a decaying bass
/// kick every beat, and a slightly right-panned stereo image.
fn synthesize_frame(
    now: f64,
    beat_period: f64,
    combined: &mut [u8],
    left: &mut [u8],
    right: &mut [u8],
    waveform: &mut [u8],
) {
    let phase = now % beat_period;
    let kick_env = if phase < KICK_LENGTH_SECS {
        (1.0 - phase / KICK_LENGTH_SECS) as f32
    } else {
        0.0
    };

    let hz_per_bin = SAMPLE_RATE * 0.5 / BINS as f32;
    for (i, bin) in combined.iter_mut().enumerate() {
        let hz = i as f32 * hz_per_bin;
        let mut level = 0.0f32;
        if (250.0..4000.0).contains(&hz) {
            level += 60.0;
        }
        if hz >= 4000.0 {
            level += 25.0;
        }
        if hz < 250.0 {
            level += 230.0 * kick_env;
        }
        *bin = level.min(255.0) as u8;
    }

    for i in 0..combined.len() {
        left[i] = (f32::from(combined[i]) * 0.9) as u8;
        right[i] = combined[i];
    }

    let amp = f64::from(20.0 + 100.0 * kick_env);
    let waveform_len = waveform.len();
    for (i, sample) in waveform.iter_mut().enumerate() {
        let t = i as f64 / waveform_len as f64;
        let v = 128.0 + amp * (t * std::f64::consts::TAU * 3.0).sin();
        *sample = v.clamp(0.0, 255.0) as u8;
    }
}
