use std::path::PathBuf;

use serde::Deserialize;

use super::emitter::EmittedEvent;
use crate::audio::pcm::{PcmBuffer, PcmFormat};
use crate::dsp::event::{Event, EventDetector};
use crate::dsp::features::{
    cosine_similarity, finite_or_zero, in_analysis_band, magnitudes_into, spectral_entropy, FeatureKind,
    FeatureSample, ENTROPY_SCALE,
};
use crate::dsp::fft::{next_fast_len, SpectrumAnalyzer, WindowFunction};
use crate::dsp::ring::SpectrogramRing;
use crate::dsp::threshold::ThresholdTracker;
use crate::dsp::{AudioProcessor, ProcessorUpdate};
use crate::error::{ConfigError, SetupError};
use crate::render::colormap::{Colormap, Painter};
use crate::render::frame::{
    VideoFrame, ACTIVE_MARKER, MATCH_MARKER, ONSET_MARKER, POWER_TRACE, SIMILARITY_TRACE,
};

/// Similarity is only scored for columns louder than this fraction of the
/// power peak.
const SIMILARITY_GATE: f32 = 1.0 / 16.0;
/// Columns at least this similar to the template get a match marker.
const MATCH_SIMILARITY: f32 = 0.85;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub colormap: Colormap,
    pub feature: FeatureKind,
    pub window_function: WindowFunction,
    /// Percentages; `None` picks 6.25/6.25 for power and the entropy defaults
    /// otherwise.
    pub threshold_low: Option<f32>,
    pub threshold_high: Option<f32>,
    /// Starting power maximum.
    pub power_max: f32,
    /// Spectrogram only: no overlays, no detection.
    pub plain: bool,
    /// JSON array replacing the built-in similarity template.
    pub template: Option<PathBuf>,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 30,
            colormap: Colormap::Grey,
            feature: FeatureKind::Power,
            window_function: WindowFunction::Hamming,
            threshold_low: None,
            threshold_high: None,
            power_max: 8_000.0,
            plain: false,
            template: None,
        }
    }
}

impl ScopeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check("width", f64::from(self.width), 1.0, 8192.0)?;
        ConfigError::check("height", f64::from(self.height), 2.0, 8192.0)?;
        ConfigError::check("fps", f64::from(self.fps), 1.0, 240.0)?;
        let (low, high) = self.thresholds();
        ConfigError::check("threshold_low", f64::from(low), 0.0, 100.0)?;
        ConfigError::check("threshold_high", f64::from(high), 0.0, 100.0)?;
        ConfigError::check("power_max", f64::from(self.power_max), 0.0, f64::from(f32::MAX))?;
        Ok(())
    }

    pub fn thresholds(&self) -> (f32, f32) {
        let (low, high) = match self.feature {
            FeatureKind::Power => (6.25, 6.25),
            FeatureKind::Entropy => self.feature.default_thresholds(),
        };
        (self.threshold_low.unwrap_or(low), self.threshold_high.unwrap_or(high))
    }

    fn tracker(&self) -> ThresholdTracker {
        let (low, high) = self.thresholds();
        let start = match self.feature {
            FeatureKind::Power => Some(self.power_max),
            FeatureKind::Entropy => None,
        };
        ThresholdTracker::new(self.feature.extreme(), self.feature.convention(), low, high).with_start(start)
    }
}

pub struct SpectrogramScope {
    settings: ScopeSettings,
    format: PcmFormat,
    analyzer: SpectrumAnalyzer,
    ring: SpectrogramRing,
    painter: Painter,
    tracker: ThresholdTracker,
    detector: EventDetector,
    template: Vec<f32>,
    /// Overlay power peak when the detector follows entropy. The power
    /// tracker holds it otherwise.
    power_peak: f32,
    mono: Vec<i16>,
    magnitudes: Vec<f32>,
    levels: Vec<f32>,
}

fn dimensions(width: u32, height: u32) -> Result<(usize, usize), SetupError> {
    if width == 0 || height < 2 {
        return Err(SetupError::InvalidDimensions { width, height });
    }
    Ok((width as usize, height as usize - 1))
}

impl SpectrogramScope {
    pub fn new(settings: ScopeSettings, format: PcmFormat, template: Vec<f32>) -> Result<Self, SetupError> {
        format.validate()?;
        if template.is_empty() {
            return Err(SetupError::EmptyTemplate);
        }
        let (width, bins) = dimensions(settings.width, settings.height)?;
        let analyzer = SpectrumAnalyzer::new(next_fast_len(2 * bins), settings.window_function)?;
        log::info!(
            "Scope {}x{} @ {} Hz x{}: {} samples per frame, {:?} colormap{}",
            width,
            bins + 1,
            format.sample_rate,
            format.channels,
            analyzer.len(),
            settings.colormap,
            if settings.plain { ", plain" } else { "" }
        );

        Ok(Self {
            ring: SpectrogramRing::new(width, bins)?,
            painter: Painter::new(settings.colormap),
            tracker: settings.tracker(),
            detector: EventDetector::new(settings.feature.direction()),
            power_peak: settings.power_max,
            mono: Vec::with_capacity(analyzer.len()),
            magnitudes: Vec::with_capacity(bins),
            levels: Vec::with_capacity(bins),
            analyzer,
            template,
            settings,
            format,
        })
    }

    /// Re-allocate for a new format or frame size and drop all history.
    pub fn setup(&mut self, format: PcmFormat, width: u32, height: u32) -> Result<(), SetupError> {
        format.validate()?;
        let (columns, bins) = dimensions(width, height)?;
        self.analyzer
            .reconfigure(next_fast_len(2 * bins), self.settings.window_function)?;
        self.ring = SpectrogramRing::new(columns, bins)?;
        self.settings.width = width;
        self.settings.height = height;
        self.format = format;
        self.reset();
        log::info!(
            "Scope re-initialised: {}x{} @ {} Hz x{}",
            width,
            height,
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    /// Mono samples consumed per rendered frame.
    pub fn samples_per_fft(&self) -> usize {
        self.analyzer.len()
    }

    pub fn detector(&self) -> &EventDetector {
        &self.detector
    }

    /// Largest band power seen so far, seeded with `power_max`.
    fn power_peak(&self) -> f32 {
        match self.settings.feature {
            FeatureKind::Power => self.tracker.extreme(),
            FeatureKind::Entropy => self.power_peak,
        }
    }

    /// Analyse the first window of `buffer` (zero-padded when short) into a
    /// new column. Returns the event the column triggered, if any.
    pub fn render(&mut self, buffer: &PcmBuffer<'_>) -> Option<EmittedEvent> {
        if buffer.format != self.format {
            let (width, height) = (self.settings.width, self.settings.height);
            if let Err(err) = self.setup(buffer.format, width, height) {
                log::error!("Skipping frame in unsupported format: {err}");
                return None;
            }
        }

        let bins = self.ring.bins();
        let spf = self.analyzer.len();
        buffer.downmix_into(&mut self.mono);
        self.mono.resize(spf, 0);

        let spectrum = self.analyzer.process(&self.mono);
        magnitudes_into(spectrum, bins, ENTROPY_SCALE, &mut self.magnitudes);

        let scale = bins as f32;
        self.levels.clear();
        self.levels
            .extend(self.magnitudes.iter().map(|m| finite_or_zero(scale * m).min(255.0).floor()));
        self.levels.resize(bins, 0.0);

        let power = finite_or_zero(
            self.levels
                .iter()
                .enumerate()
                .filter(|(row, _)| in_analysis_band(*row, bins))
                .map(|(_, level)| level)
                .sum(),
        );
        let entropy = spectral_entropy(&self.magnitudes);
        let similarity = if !self.settings.plain && power > self.power_peak() * SIMILARITY_GATE {
            cosine_similarity(&self.levels, &self.template)
        } else {
            0.0
        };

        let sample = FeatureSample {
            power,
            entropy,
            similarity,
        };
        let event = if self.settings.plain {
            None
        } else {
            self.step(&sample, buffer.time())
        };

        if self.settings.feature == FeatureKind::Entropy && power > self.power_peak {
            self.power_peak = power;
            log::debug!("Power max: {power}");
        }

        let active = self.detector.is_active();
        let column = self.ring.advance();
        for (cell, level) in column.intensities.iter_mut().zip(&self.levels) {
            *cell = *level as u8;
        }
        column.power = power;
        column.similarity = similarity;
        column.active = active;
        column.onset = matches!(event, Some(EmittedEvent { event: Event::Onset, .. }));

        event
    }

    fn step(&mut self, sample: &FeatureSample, time: f64) -> Option<EmittedEvent> {
        let Some(value) = self.settings.feature.select(sample).map(finite_or_zero) else {
            log::debug!("{:?} undefined at {:.3}s, skipped", self.settings.feature, time);
            return None;
        };
        self.tracker.observe(value);
        log::debug!(
            "{:?}: {:.2} low: {:.2} high: {:.2}",
            self.settings.feature,
            value,
            self.tracker.low(),
            self.tracker.high()
        );

        let event = self
            .detector
            .update(value, self.tracker.low(), self.tracker.high())?;
        log::info!("{} {} event at {:.3}s", self.detector.onsets(), event, time);
        Some(EmittedEvent {
            event,
            index: self.detector.onsets(),
            time,
        })
    }

    /// Paint the whole ring into `frame`, oldest column on the left. Row 0 is
    /// the top; the lowest bin sits just above the bottom row.
    pub fn paint(&mut self, frame: &mut VideoFrame) {
        frame.clear();
        let bins = self.ring.bins();
        let overlays = !self.settings.plain;
        let peak = self.power_peak();

        for (x, column) in self.ring.display().enumerate() {
            for (y, &intensity) in column.intensities.iter().enumerate() {
                frame.set(x, bins - 1 - y, self.painter.color(intensity));
            }
            if !overlays {
                continue;
            }

            frame.set(x, trace_row(column.power * bins as f32 / peak, bins), POWER_TRACE);
            frame.set(
                x,
                trace_row(column.similarity * (bins - 1) as f32, bins),
                SIMILARITY_TRACE,
            );
            if column.active {
                frame.set(x, 0, ACTIVE_MARKER);
            }
            if column.onset {
                frame.set(x, 1, ONSET_MARKER);
            }
            if column.similarity > MATCH_SIMILARITY {
                frame.set(x, 2, MATCH_MARKER);
            }
        }
    }
}

/// Frame row for a trace level measured upwards from the lowest bin row.
fn trace_row(level: f32, bins: usize) -> usize {
    let top = (bins - 1) as f32;
    let level = finite_or_zero(level).clamp(0.0, top) as usize;
    bins - 1 - level
}

impl AudioProcessor for SpectrogramScope {
    type Output = EmittedEvent;

    fn process_block(&mut self, block: &PcmBuffer<'_>) -> ProcessorUpdate<Self::Output> {
        match self.render(block) {
            Some(event) => ProcessorUpdate::Snapshot(event),
            None => ProcessorUpdate::None,
        }
    }

    fn reset(&mut self) {
        self.ring.clear();
        self.painter.reset();
        self.tracker = self.settings.tracker();
        self.detector.reset();
        self.power_peak = self.settings.power_max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::ring::Column;
    use crate::element::template::default_template;

    const RATE: u32 = 8_000;

    fn scope(width: u32, height: u32, plain: bool) -> SpectrogramScope {
        SpectrogramScope::new(
            ScopeSettings {
                width,
                height,
                plain,
                ..ScopeSettings::default()
            },
            PcmFormat::new(RATE, 1),
            default_template(),
        )
        .unwrap()
    }

    fn tone(len: usize, cycles: f32, amplitude: f32) -> Vec<i16> {
        (0..len)
            .map(|n| (amplitude * (std::f32::consts::TAU * cycles * n as f32 / len as f32).sin()) as i16)
            .collect()
    }

    fn noisy_tone(len: usize, cycles: f32, amplitude: f32) -> Vec<i16> {
        let mut state = 7u32;
        tone(len, cycles, amplitude)
            .into_iter()
            .map(|s| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                s.saturating_add((state >> 16) as i16 % 100)
            })
            .collect()
    }

    fn feed(scope: &mut SpectrogramScope, samples: &[i16]) -> Option<EmittedEvent> {
        scope.render(&PcmBuffer::new(samples, PcmFormat::new(RATE, 1), 0))
    }

    fn newest(scope: &SpectrogramScope) -> &Column {
        scope.ring.display().last().unwrap()
    }

    fn pixel(frame: &VideoFrame, width: usize, x: usize, y: usize) -> u32 {
        let at = 4 * (y * width + x);
        u32::from_ne_bytes(frame.as_bytes()[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn geometry_follows_frame_height() {
        let scope = scope(16, 100, false);
        assert_eq!(scope.ring.bins(), 99);
        assert_eq!(scope.ring.display().count(), 16);
        assert_eq!(scope.samples_per_fft(), 200);
    }

    #[test]
    fn rejects_degenerate_setup() {
        let make = |width, height, template: Vec<f32>| {
            SpectrogramScope::new(
                ScopeSettings {
                    width,
                    height,
                    ..ScopeSettings::default()
                },
                PcmFormat::new(RATE, 1),
                template,
            )
        };
        assert!(matches!(
            make(0, 100, default_template()),
            Err(SetupError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            make(10, 1, default_template()),
            Err(SetupError::InvalidDimensions { .. })
        ));
        assert!(matches!(make(10, 100, Vec::new()), Err(SetupError::EmptyTemplate)));
    }

    #[test]
    fn silence_writes_quiet_column() {
        let mut scope = scope(8, 100, false);
        assert!(feed(&mut scope, &[0; 200]).is_none());
        assert_eq!(scope.ring.display_index(7), 0);
        let column = newest(&scope);
        assert_eq!(column.power, 0.0);
        assert_eq!(column.similarity, 0.0);
        assert!(column.intensities.iter().all(|&i| i == 0));
    }

    #[test]
    fn loud_tone_fires_onset_then_offset() {
        let mut scope = scope(8, 100, false);
        let loud = tone(200, 20.0, 30_000.0);

        let onset = feed(&mut scope, &loud).map(|e| e.event);
        assert_eq!(onset, Some(Event::Onset));
        let column = newest(&scope);
        assert!(column.onset && column.active);
        assert!(column.power > 500.0);
        assert_eq!(column.intensities[19], 255);

        assert!(feed(&mut scope, &loud).is_none());
        assert_eq!(feed(&mut scope, &[0; 200]).map(|e| e.event), Some(Event::Offset));
        assert!(!newest(&scope).active);
    }

    #[test]
    fn matching_template_marks_column() {
        let mut scope = scope(8, 100, false);
        let loud = tone(200, 20.0, 30_000.0);
        feed(&mut scope, &loud);
        let reference: Vec<f32> = newest(&scope).intensities.iter().map(|&i| f32::from(i)).collect();
        scope.template = reference;

        feed(&mut scope, &loud);
        let column = newest(&scope);
        assert!(column.similarity > 0.99, "similarity {}", column.similarity);

        let mut frame = VideoFrame::new(8, 100);
        scope.paint(&mut frame);
        assert_eq!(pixel(&frame, 8, 7, 0), ACTIVE_MARKER);
        assert_eq!(pixel(&frame, 8, 7, 2), MATCH_MARKER);
        // previous column carries the onset marker
        assert_eq!(pixel(&frame, 8, 6, 1), ONSET_MARKER);
        assert_ne!(pixel(&frame, 8, 7, 1), ONSET_MARKER);
    }

    #[test]
    fn plain_mode_paints_spectrogram_only() {
        let mut scope = scope(4, 100, true);
        let loud = tone(200, 20.0, 30_000.0);
        assert!(feed(&mut scope, &loud).is_none());
        assert!(feed(&mut scope, &[0; 200]).is_none());
        assert!(!scope.detector().is_active());

        let mut frame = VideoFrame::new(4, 100);
        scope.paint(&mut frame);
        // tone column is second newest; bin 19 sits at row 99 - 1 - 19
        assert_eq!(pixel(&frame, 4, 2, 79), 0x00FF_FFFF);
        assert_eq!(pixel(&frame, 4, 3, 79), 0);
        assert_eq!(pixel(&frame, 4, 2, 0), 0);
        // bottom row is never painted
        assert!((0..4).all(|x| pixel(&frame, 4, x, 99) == 0));
    }

    #[test]
    fn power_trace_is_clamped_into_frame() {
        assert_eq!(trace_row(0.0, 99), 98);
        assert_eq!(trace_row(500.0, 99), 0);
        assert_eq!(trace_row(f32::NAN, 99), 98);
        assert_eq!(trace_row(-3.0, 99), 98);
    }

    #[test]
    fn scrolls_one_column_per_render() {
        let width = 5;
        let mut scope = scope(width, 50, false);
        for _ in 0..=width {
            feed(&mut scope, &[0; 10]);
        }
        // cursor wrapped back to the first column
        assert_eq!(scope.ring.display_index(width as usize - 1), 0);
    }

    #[test]
    fn louder_columns_raise_power_peak() {
        let make = |feature| {
            SpectrogramScope::new(
                ScopeSettings {
                    width: 4,
                    height: 100,
                    power_max: 100.0,
                    feature,
                    ..ScopeSettings::default()
                },
                PcmFormat::new(RATE, 1),
                default_template(),
            )
            .unwrap()
        };
        let loud = tone(200, 20.0, 30_000.0);

        let mut power = make(FeatureKind::Power);
        feed(&mut power, &loud);
        assert!(power.power_peak() > 500.0);
        assert_eq!(power.power_peak(), power.tracker.extreme());

        let mut entropy = make(FeatureKind::Entropy);
        feed(&mut entropy, &loud);
        assert_eq!(entropy.power_peak(), power.power_peak());
    }

    #[test]
    fn reset_restores_configured_state() {
        let mut scope = scope(4, 100, false);
        feed(&mut scope, &tone(200, 20.0, 30_000.0));
        scope.reset();
        assert!(scope.ring.display().all(|c| c.power == 0.0 && !c.active));
        assert!(!scope.detector().is_active());
        assert_eq!(scope.power_peak(), 8_000.0);
    }

    #[test]
    fn setup_reallocates_for_new_geometry() {
        let mut scope = scope(4, 100, false);
        scope.setup(PcmFormat::new(RATE, 2), 6, 50).unwrap();
        assert_eq!(scope.ring.bins(), 49);
        assert_eq!(scope.ring.display().count(), 6);
        assert_eq!(scope.samples_per_fft(), next_fast_len(98));
        assert!(scope.setup(PcmFormat::new(RATE, 3), 6, 50).is_err());
    }

    #[test]
    fn entropy_feature_activates_on_tonal_columns() {
        let mut scope = SpectrogramScope::new(
            ScopeSettings {
                width: 4,
                height: 100,
                feature: FeatureKind::Entropy,
                threshold_low: Some(2.0),
                threshold_high: Some(1.5),
                ..ScopeSettings::default()
            },
            PcmFormat::new(RATE, 1),
            default_template(),
        )
        .unwrap();
        let samples = noisy_tone(200, 20.0, 20_000.0);
        let update = scope.process_block(&PcmBuffer::new(&samples, PcmFormat::new(RATE, 1), 0));
        let event: Option<EmittedEvent> = update.into();
        assert_eq!(event.map(|e| e.event), Some(Event::Onset));
    }
    #[test]
    fn silent_column_leaves_entropy_tracking_alone() {
        let mut scope = SpectrogramScope::new(
            ScopeSettings {
                width: 4,
                height: 100,
                feature: FeatureKind::Entropy,
                threshold_low: Some(2.0),
                threshold_high: Some(1.5),
                ..ScopeSettings::default()
            },
            PcmFormat::new(RATE, 1),
            default_template(),
        )
        .unwrap();
        assert!(feed(&mut scope, &[0; 200]).is_none());
        assert_eq!(scope.tracker.extreme(), f32::MAX);
        assert!(!newest(&scope).active);

        let onset = feed(&mut scope, &noisy_tone(200, 20.0, 20_000.0));
        assert_eq!(onset.map(|e| e.event), Some(Event::Onset));
        assert!(scope.tracker.extreme() > 0.0);
    }
}
