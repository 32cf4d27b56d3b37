//! Frequency-band extraction from raw byte spectra.

use super::frame::SpectrumFrame;

/// Number of fine-grained color-mapping bands (`freq1..freq10`).
pub const COLOR_BANDS: usize = 10;

/// Coarse band boundaries in Hz. Treble runs from its floor to Nyquist.
const BASS_HZ: (f32, f32) = (20.0, 250.0);
const MID_HZ: (f32, f32) = (250.0, 4000.0);
const TREBLE_LO_HZ: f32 = 4000.0;

/// Lower edge of the logarithmic color-band split.
const COLOR_MIN_HZ: f32 = 20.0;

/// The three coarse perceptual bands that drive beat detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    Bass,
    Mid,
    Treble,
}

impl BandKind {
    pub const ALL: [BandKind; 3] = [BandKind::Bass, BandKind::Mid, BandKind::Treble];
}

/// Named band levels extracted from one spectrum frame.
///
/// All levels are in 0.0-1.0. Stereo variants are signed right-minus-left
/// balance values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandLevels {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub freq: [f32; COLOR_BANDS],
    pub bass_stereo: f32,
    pub mid_stereo: f32,
    pub treble_stereo: f32,
}

impl BandLevels {
    /// Level of one coarse band.
    pub fn level(&self, kind: BandKind) -> f32 {
        match kind {
            BandKind::Bass => self.bass,
            BandKind::Mid => self.mid,
            BandKind::Treble => self.treble,
        }
    }

    /// Stereo balance of one coarse band.
    pub fn stereo(&self, kind: BandKind) -> f32 {
        match kind {
            BandKind::Bass => self.bass_stereo,
            BandKind::Mid => self.mid_stereo,
            BandKind::Treble => self.treble_stereo,
        }
    }
}

/// Converts raw frequency-bin magnitudes into named band levels.
///
/// Stateless apart from the stereo emphasis exponent; band boundaries are
/// fixed Hz ranges resolved against the frame's sample rate.
pub struct BandExtractor {
    stereo_emphasis: f32,
}

impl BandExtractor {
    pub fn new(stereo_emphasis: f32) -> Self {
        Self { stereo_emphasis }
    }

    pub fn set_stereo_emphasis(&mut self, exponent: f32) {
        self.stereo_emphasis = exponent;
    }

    /// Extract all band levels for one frame. Degenerate input (empty
    /// spectrum, non-positive sample rate) yields all-zero bands.
    pub fn extract(&self, frame: &SpectrumFrame) -> BandLevels {
        let mut out = BandLevels::default();
        if frame.combined.is_empty() || frame.sample_rate <= 0.0 {
            return out;
        }

        let sr = frame.sample_rate;
        let nyquist = sr * 0.5;

        out.bass = band_level(frame.combined, sr, BASS_HZ.0, BASS_HZ.1);
        out.mid = band_level(frame.combined, sr, MID_HZ.0, MID_HZ.1);
        out.treble = band_level(frame.combined, sr, TREBLE_LO_HZ, nyquist);

        // Ten logarithmic slices across the full spectrum.
        let ratio = nyquist / COLOR_MIN_HZ;
        for i in 0..COLOR_BANDS {
            let lo = COLOR_MIN_HZ * ratio.powf(i as f32 / COLOR_BANDS as f32);
            let hi = COLOR_MIN_HZ * ratio.powf((i + 1) as f32 / COLOR_BANDS as f32);
            out.freq[i] = band_level(frame.combined, sr, lo, hi);
        }

        if !frame.left.is_empty() && frame.left.len() == frame.right.len() {
            out.bass_stereo = self.stereo_balance(frame, BASS_HZ.0, BASS_HZ.1);
            out.mid_stereo = self.stereo_balance(frame, MID_HZ.0, MID_HZ.1);
            out.treble_stereo = self.stereo_balance(frame, TREBLE_LO_HZ, nyquist);
        }

        out
    }

    /// Right-minus-left balance with the emphasis exponent applied to the
    /// magnitude. Exponents below 1.0 boost small channel differences.
    fn stereo_balance(&self, frame: &SpectrumFrame, lo_hz: f32, hi_hz: f32) -> f32 {
        let right = band_level(frame.right, frame.sample_rate, lo_hz, hi_hz);
        let left = band_level(frame.left, frame.sample_rate, lo_hz, hi_hz);
        let diff = right - left;
        if diff == 0.0 {
            0.0
        } else {
            diff.signum() * diff.abs().powf(self.stereo_emphasis)
        }
    }
}

/// Map a frequency to its bin index: `floor(hz / (sample_rate/2 / bins))`.
fn bin_index(hz: f32, sample_rate: f32, bin_count: usize) -> usize {
    let hz_per_bin = sample_rate * 0.5 / bin_count as f32;
    (hz / hz_per_bin).floor().max(0.0) as usize
}

/// Average byte magnitude over a Hz range, normalized to 0.0-1.0.
fn band_level(spectrum: &[u8], sample_rate: f32, lo_hz: f32, hi_hz: f32) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let lo = bin_index(lo_hz, sample_rate, spectrum.len());
    let hi = bin_index(hi_hz, sample_rate, spectrum.len()).min(spectrum.len());
    if lo >= hi {
        return 0.0;
    }
    let sum: u32 = spectrum[lo..hi].iter().map(|&m| u32::from(m)).sum();
    sum as f32 / (hi - lo) as f32 / 255.0
}
