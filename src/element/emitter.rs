use clap::ValueEnum;
use serde::Deserialize;

use crate::audio::pcm::{analysis_windows, PcmBuffer, PcmFormat};
use crate::dsp::event::{Event, EventDetector};
use crate::dsp::features::{FeatureExtractor, FeatureKind, FeatureSample};
use crate::dsp::fft::{next_fast_len, SpectrumAnalyzer, WindowFunction};
use crate::dsp::threshold::ThresholdTracker;
use crate::dsp::{AudioProcessor, ProcessorUpdate};
use crate::error::{ConfigError, SetupError};

/// How many analysis windows feed one detector step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One step per analysis window.
    #[default]
    Window,
    /// Features of every full window in a buffer are summed into one step.
    Buffer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitterSettings {
    pub feature: FeatureKind,
    pub window_size: u32,
    pub window_function: WindowFunction,
    /// Accepted for compatibility; windows are always analysed back-to-back.
    pub overlap: u32,
    pub bins: u32,
    /// Percentages; `None` falls back to the feature's defaults.
    pub threshold_low: Option<f32>,
    pub threshold_high: Option<f32>,
    /// Manual starting maximum for power tracking.
    pub power_max: Option<f32>,
    pub granularity: Granularity,
    /// Restrict power to the 1-20 kHz band instead of all bins.
    pub band_limited: bool,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            feature: FeatureKind::Power,
            window_size: 200,
            window_function: WindowFunction::Hamming,
            overlap: 0,
            bins: 100,
            threshold_low: None,
            threshold_high: None,
            power_max: None,
            granularity: Granularity::Window,
            band_limited: false,
        }
    }
}

impl EmitterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check("window_size", f64::from(self.window_size), 100.0, 1000.0)?;
        ConfigError::check("overlap", f64::from(self.overlap), 0.0, 100.0)?;
        ConfigError::check("bins", f64::from(self.bins), 50.0, 1000.0)?;
        let (low, high) = self.thresholds();
        ConfigError::check("threshold_low", f64::from(low), 0.0, 100.0)?;
        ConfigError::check("threshold_high", f64::from(high), 0.0, 100.0)?;
        if let Some(max) = self.power_max {
            ConfigError::check("power_max", f64::from(max), 0.0, f64::from(f32::MAX))?;
        }
        Ok(())
    }

    pub fn thresholds(&self) -> (f32, f32) {
        let (low, high) = self.feature.default_thresholds();
        (self.threshold_low.unwrap_or(low), self.threshold_high.unwrap_or(high))
    }

    /// Transform length: large enough for both the window size and the
    /// requested bin count, rounded up to a fast length.
    pub fn samples_per_fft(&self) -> usize {
        let for_bins = (2 * self.bins as usize).saturating_sub(2);
        next_fast_len((self.window_size as usize).max(for_bins))
    }

    fn tracker(&self) -> ThresholdTracker {
        let (low, high) = self.thresholds();
        let start = match self.feature {
            FeatureKind::Power => self.power_max,
            FeatureKind::Entropy => None,
        };
        ThresholdTracker::new(self.feature.extreme(), self.feature.convention(), low, high).with_start(start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmittedEvent {
    pub event: Event,
    /// Onset counter at the time of the event.
    pub index: u64,
    /// Stream time of the triggering window (or buffer), in seconds.
    pub time: f64,
}

pub struct EventEmitter {
    settings: EmitterSettings,
    format: PcmFormat,
    analyzer: SpectrumAnalyzer,
    extractor: FeatureExtractor,
    tracker: ThresholdTracker,
    detector: EventDetector,
    mono: Vec<i16>,
    windows_processed: u64,
}

impl EventEmitter {
    pub fn new(settings: EmitterSettings, format: PcmFormat) -> Result<Self, SetupError> {
        format.validate()?;
        let analyzer = SpectrumAnalyzer::new(settings.samples_per_fft(), settings.window_function)?;

        if settings.overlap != 0 {
            log::warn!(
                "overlap={} is accepted but analysis windows stay back-to-back",
                settings.overlap
            );
        }
        if settings.feature == FeatureKind::Entropy && settings.power_max.is_some() {
            log::warn!("power_max has no effect on the entropy emitter");
        }
        log::info!(
            "{:?} emitter: {} Hz x{}, {} samples per FFT, {} bins, {:?} window",
            settings.feature,
            format.sample_rate,
            format.channels,
            analyzer.len(),
            settings.bins,
            analyzer.window()
        );

        Ok(Self {
            extractor: FeatureExtractor::new(settings.feature, settings.bins as usize)
                .band_limited(settings.band_limited),
            tracker: settings.tracker(),
            detector: EventDetector::new(settings.feature.direction()),
            mono: Vec::with_capacity(analyzer.len() * 8),
            windows_processed: 0,
            analyzer,
            settings,
            format,
        })
    }

    /// Renegotiate the stream format: reallocate the transform and start
    /// over with fresh thresholds and event state.
    pub fn setup(&mut self, format: PcmFormat) -> Result<(), SetupError> {
        format.validate()?;
        self.analyzer
            .reconfigure(self.settings.samples_per_fft(), self.settings.window_function)?;
        self.format = format;
        self.reset();
        log::info!(
            "Emitter re-initialised for {} Hz x{}",
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    pub fn detector(&self) -> &EventDetector {
        &self.detector
    }

    pub fn windows_processed(&self) -> u64 {
        self.windows_processed
    }

    /// Analyse one delivered buffer and return the events it produced, in
    /// stream order.
    pub fn chain(&mut self, buffer: &PcmBuffer<'_>) -> Vec<EmittedEvent> {
        let mut events = Vec::new();
        if buffer.format != self.format {
            if let Err(err) = self.setup(buffer.format) {
                log::error!("Dropping buffer in unsupported format: {err}");
                return events;
            }
        }

        let mut mono = std::mem::take(&mut self.mono);
        buffer.downmix_into(&mut mono);

        let spf = self.analyzer.len();
        let rate = f64::from(self.format.sample_rate);
        let mut total = FeatureSample::default();
        let mut windows = 0usize;

        for (idx, window) in analysis_windows(&mono, spf).enumerate() {
            let spectrum = self.analyzer.process(window);
            let sample = self.extractor.extract(spectrum);
            self.windows_processed += 1;

            match self.settings.granularity {
                Granularity::Window => {
                    let time = buffer.time() + (idx * spf) as f64 / rate;
                    events.extend(self.step(&sample, time));
                }
                Granularity::Buffer => {
                    total.accumulate(&sample);
                    windows += 1;
                }
            }
        }

        if self.settings.granularity == Granularity::Buffer && windows > 0 {
            events.extend(self.step(&total, buffer.time()));
        }

        self.mono = mono;
        events
    }

    /// One detector step. A window with undefined entropy leaves both the
    /// tracker and the detector untouched.
    fn step(&mut self, sample: &FeatureSample, time: f64) -> Option<EmittedEvent> {
        let Some(value) = self.extractor.value(sample) else {
            log::debug!("{:?} undefined at {:.3}s, skipped", self.extractor.kind(), time);
            return None;
        };
        if self.tracker.observe(value) {
            log::debug!("New {:?} extreme: {:.4}", self.extractor.kind(), value);
        }
        log::debug!(
            "{:?}: {:.4} low: {:.4} high: {:.4}",
            self.extractor.kind(),
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
}

impl AudioProcessor for EventEmitter {
    type Output = Vec<EmittedEvent>;

    fn process_block(&mut self, block: &PcmBuffer<'_>) -> ProcessorUpdate<Self::Output> {
        let events = self.chain(block);
        if events.is_empty() {
            ProcessorUpdate::None
        } else {
            ProcessorUpdate::Snapshot(events)
        }
    }

    fn reset(&mut self) {
        self.tracker.reset();
        self.detector.reset();
        self.windows_processed = 0;
    }
}
