use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, MAX_BUFFER_FRAMES};
use crate::dsp::features::FeatureKind;
use crate::dsp::fft::WindowFunction;
use crate::element::Granularity;
use crate::encode::events::EventFormat;
use crate::render::colormap::Colormap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Element {
    /// Print onset/offset events
    Events,
    /// Render a scrolling spectrogram video
    Scope,
}

/// Values given here override the config file; unset options keep it.
#[derive(Parser, Debug)]
#[command(name = "onsetscope", about = "Spectral onset/offset detection and spectrogram scope")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG), or `-` for raw PCM on stdin
    pub input: PathBuf,

    /// Which element to run
    #[arg(short, long, value_enum, default_value_t = Element::Events)]
    pub element: Element,

    /// Scope only: plain spectrogram without overlays or events
    #[arg(long)]
    pub plain: bool,

    /// Feature driving the detector
    #[arg(long, value_enum)]
    pub feature: Option<FeatureKind>,

    /// Analysis window size in samples
    #[arg(long, value_parser = clap::value_parser!(u32).range(100..=1000))]
    pub window_size: Option<u32>,

    /// Window function applied before the FFT
    #[arg(long, value_enum)]
    pub window_function: Option<WindowFunction>,

    /// Window overlap percentage (accepted, windows stay back-to-back)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub overlap: Option<u32>,

    /// Number of frequency bins analysed by the event emitter
    #[arg(long, value_parser = clap::value_parser!(u32).range(50..=1000))]
    pub bins: Option<u32>,

    /// Low threshold, percent of the tracked extreme
    #[arg(long, value_parser = percentage)]
    pub threshold_low: Option<f32>,

    /// High threshold, percent of the tracked extreme
    #[arg(long, value_parser = percentage)]
    pub threshold_high: Option<f32>,

    /// Manual starting maximum for power tracking
    #[arg(long)]
    pub power_max: Option<f32>,

    /// One detector step per window or per buffer
    #[arg(long, value_enum)]
    pub granularity: Option<Granularity>,

    /// Event emitter: only count power between roughly 1 and 20 kHz
    #[arg(long)]
    pub band_limited: bool,

    /// Scope colormap
    #[arg(long, value_enum)]
    pub colormap: Option<Colormap>,

    /// Video width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Similarity template (JSON array of intensities)
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Output video file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// FFmpeg video codec
    #[arg(long)]
    pub codec: Option<String>,

    /// FFmpeg pixel format
    #[arg(long)]
    pub pix_fmt: Option<String>,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long)]
    pub crf: Option<u32>,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Event output format
    #[arg(long, value_enum)]
    pub format: Option<EventFormat>,

    /// Frames per buffer delivered to the element
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_BUFFER_FRAMES)))]
    pub buffer_frames: Option<u32>,

    /// Treat the input as headerless S16LE PCM
    #[arg(long)]
    pub raw: bool,

    /// Sample rate of raw input
    #[arg(long, value_parser = clap::value_parser!(u32).range(8000..=96000))]
    pub rate: Option<u32>,

    /// Channel count of raw input
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=2))]
    pub channels: Option<u16>,

    /// Config file (default: ./onsetscope.toml, then ~/.config/onsetscope/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn percentage(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0-100"))
    }
}

impl Cli {
    /// Raw input is forced for stdin.
    pub fn is_raw(&self) -> bool {
        self.raw || self.input.as_os_str() == "-"
    }

    pub fn apply(&self, config: &mut Config) {
        let emitter = &mut config.emitter;
        let scope = &mut config.scope;

        if let Some(feature) = self.feature {
            emitter.feature = feature;
            scope.feature = feature;
        }
        if let Some(window) = self.window_function {
            emitter.window_function = window;
            scope.window_function = window;
        }
        if let Some(low) = self.threshold_low {
            emitter.threshold_low = Some(low);
            scope.threshold_low = Some(low);
        }
        if let Some(high) = self.threshold_high {
            emitter.threshold_high = Some(high);
            scope.threshold_high = Some(high);
        }
        if let Some(max) = self.power_max {
            emitter.power_max = Some(max);
            scope.power_max = max;
        }
        if let Some(v) = self.window_size { emitter.window_size = v; }
        if let Some(v) = self.overlap { emitter.overlap = v; }
        if let Some(v) = self.bins { emitter.bins = v; }
        if let Some(v) = self.granularity { emitter.granularity = v; }
        if self.band_limited { emitter.band_limited = true; }

        if let Some(v) = self.colormap { scope.colormap = v; }
        if let Some(v) = self.width { scope.width = v; }
        if let Some(v) = self.height { scope.height = v; }
        if let Some(v) = self.fps { scope.fps = v; }
        if self.plain { scope.plain = true; }
        if self.template.is_some() { scope.template = self.template.clone(); }

        let output = &mut config.output;
        if let Some(ref v) = self.output { output.path = v.clone(); }
        if let Some(ref v) = self.codec { output.codec = v.clone(); }
        if let Some(ref v) = self.pix_fmt { output.pix_fmt = v.clone(); }
        if let Some(v) = self.crf { output.crf = v; }
        if self.bitrate.is_some() { output.bitrate = self.bitrate.clone(); }
        if let Some(v) = self.format { output.format = v; }

        let input = &mut config.input;
        if let Some(v) = self.buffer_frames { input.buffer_frames = v as usize; }
        if let Some(v) = self.rate { input.rate = v; }
        if let Some(v) = self.channels { input.channels = v; }
    }
}
