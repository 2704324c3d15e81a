use clap::ValueEnum;
use rustfft::num_complex::Complex32;
use serde::Deserialize;

use super::event::Direction;
use super::threshold::{Extreme, ThresholdConvention};

/// Magnitude divisor for entropy-style extraction and for spectrogram
/// intensities.
pub const ENTROPY_SCALE: f32 = 512.0;
/// Magnitude divisor for the power-only emitter.
pub const POWER_SCALE: f32 = 65_536.0;

/// Which feature drives a detector. Each kind fixes its magnitude scale, the
/// extreme its threshold tracker follows and the direction that activates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    #[default]
    Power,
    Entropy,
}

impl FeatureKind {
    pub fn magnitude_scale(self) -> f32 {
        match self {
            FeatureKind::Power => POWER_SCALE,
            FeatureKind::Entropy => ENTROPY_SCALE,
        }
    }

    pub fn extreme(self) -> Extreme {
        match self {
            FeatureKind::Power => Extreme::Max,
            FeatureKind::Entropy => Extreme::Min,
        }
    }

    pub fn convention(self) -> ThresholdConvention {
        match self {
            FeatureKind::Power => ThresholdConvention::Percent,
            FeatureKind::Entropy => ThresholdConvention::Ratio,
        }
    }

    /// Power activates on rising values, entropy on falling (tonal) values.
    pub fn direction(self) -> Direction {
        match self {
            FeatureKind::Power => Direction::Rising,
            FeatureKind::Entropy => Direction::Falling,
        }
    }

    pub fn default_thresholds(self) -> (f32, f32) {
        match self {
            FeatureKind::Power => (10.0, 50.0),
            FeatureKind::Entropy => (5.0, 15.0),
        }
    }

    /// The scalar this kind tracks, `None` when it is undefined for the
    /// window.
    pub fn select(self, sample: &FeatureSample) -> Option<f32> {
        match self {
            FeatureKind::Power => Some(sample.power),
            FeatureKind::Entropy => sample.entropy,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureSample {
    pub power: f32,
    /// Spectral flatness in [0, 1]; `None` for a silent window.
    pub entropy: Option<f32>,
    pub similarity: f32,
}

impl FeatureSample {
    /// Sum `other` into `self`. Undefined entropy adds nothing, so the total
    /// stays undefined only while every window was silent.
    pub fn accumulate(&mut self, other: &FeatureSample) {
        self.power += other.power;
        self.entropy = match (self.entropy, other.entropy) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.similarity += other.similarity;
    }
}

/// Maps NaN and infinities to zero so nothing non-finite reaches the
/// threshold tracker or the event detector.
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Fill `out` with `|bin| / scale` for bins `1..=count`, skipping DC. The
/// count is clamped to the bins the spectrum actually has.
pub fn magnitudes_into(spectrum: &[Complex32], count: usize, scale: f32, out: &mut Vec<f32>) {
    out.clear();
    let available = spectrum.len().saturating_sub(1);
    out.extend(
        spectrum
            .iter()
            .skip(1)
            .take(count.min(available))
            .map(|c| (c.re / scale).hypot(c.im / scale)),
    );
}

pub fn power(magnitudes: &[f32]) -> f32 {
    finite_or_zero(magnitudes.iter().sum())
}

/// Rows strictly between `total/48` and `total*20/48`, roughly the 1-20 kHz
/// part of the usable range.
pub fn in_analysis_band(row: usize, total: usize) -> bool {
    let row = row as f32;
    let total = total as f32;
    row > total / 48.0 && row < total * 20.0 / 48.0
}

/// Geometric over arithmetic mean of the magnitudes. `None` when the
/// arithmetic mean is zero (or not finite), since the ratio is undefined
/// there; a single empty bin with energy elsewhere gives 0.
pub fn spectral_entropy(magnitudes: &[f32]) -> Option<f32> {
    if magnitudes.is_empty() {
        return None;
    }
    let count = magnitudes.len() as f32;
    let arithmetic = magnitudes.iter().sum::<f32>() / count;
    if !(arithmetic > 0.0) || !arithmetic.is_finite() {
        return None;
    }
    if magnitudes.iter().any(|&m| !(m > 0.0)) {
        return Some(0.0);
    }

    // Log domain: the plain product of a few hundred magnitudes under- or
    // overflows f32.
    let log_mean = magnitudes.iter().map(|m| m.ln()).sum::<f32>() / count;
    let geometric = log_mean.exp();
    Some(finite_or_zero(geometric / arithmetic).clamp(0.0, 1.0))
}

/// Cosine of the angle between `a` and `b` over their common length; 0 when
/// either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        finite_or_zero(dot / denom)
    } else {
        0.0
    }
}

/// Reduces spectra to [`FeatureSample`]s for one feature kind. Owns its
/// magnitude scratch so per-window extraction does not allocate.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    kind: FeatureKind,
    bins: usize,
    band_limited: bool,
    magnitudes: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(kind: FeatureKind, bins: usize) -> Self {
        Self {
            kind,
            bins,
            band_limited: false,
            magnitudes: Vec::with_capacity(bins),
        }
    }

    pub fn band_limited(mut self, enabled: bool) -> Self {
        self.band_limited = enabled;
        self
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn extract(&mut self, spectrum: &[Complex32]) -> FeatureSample {
        magnitudes_into(spectrum, self.bins, self.kind.magnitude_scale(), &mut self.magnitudes);
        let total = self.magnitudes.len();
        let power = if self.band_limited {
            finite_or_zero(
                self.magnitudes
                    .iter()
                    .enumerate()
                    .filter(|(row, _)| in_analysis_band(*row, total))
                    .map(|(_, m)| m)
                    .sum(),
            )
        } else {
            power(&self.magnitudes)
        };

        FeatureSample {
            power,
            entropy: spectral_entropy(&self.magnitudes),
            similarity: 0.0,
        }
    }

    /// The kind's scalar for `sample`, guaranteed finite when defined.
    pub fn value(&self, sample: &FeatureSample) -> Option<f32> {
        self.kind.select(sample).map(finite_or_zero)
    }
}
