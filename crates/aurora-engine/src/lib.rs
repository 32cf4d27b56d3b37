//! Aurora: real-time audio analysis for audio-reactive visuals.
//!
//! Turns externally produced frequency-spectrum and waveform frames into
//! smoothed band levels, per-band beat events with tempo estimation, and a
//! bounded pool of decaying ripple events, assembled once per frame into an
//! [`analysis::OutputSnapshot`] the rendering layer maps onto shader
//! uniforms.
//!
//! The engine is single-threaded and frame-driven: the owning render loop
//! calls [`analysis::AudioAnalyzer::update`] once per frame, then reads the
//! snapshot. FFT, rendering, and UI live outside this crate.

pub mod analysis;
pub mod config;
pub mod error;

pub use analysis::{AudioAnalyzer, OutputSnapshot, SpectrumFrame, WaveformFrame};
pub use config::AnalyzerConfig;
pub use error::EngineError;
