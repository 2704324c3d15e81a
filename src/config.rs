use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::element::{EmitterSettings, ScopeSettings};
use crate::encode::events::EventFormat;
use crate::encode::ffmpeg::EncoderOptions;
use crate::error::ConfigError;

/// Upper bound on frames per host buffer.
pub const MAX_BUFFER_FRAMES: u32 = 1 << 20;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub emitter: EmitterSettings,
    #[serde(default)]
    pub scope: ScopeSettings,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default)]
    pub bitrate: Option<String>,
    #[serde(default)]
    pub format: EventFormat,
}

/// Stream format for headerless PCM and the host buffer size.
#[derive(Debug, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: usize,
    #[serde(default = "default_rate")]
    pub rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            bitrate: None,
            format: EventFormat::Text,
        }
    }
}

impl OutputConfig {
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            codec: self.codec.clone(),
            pix_fmt: self.pix_fmt.clone(),
            crf: self.crf,
            bitrate: self.bitrate.clone(),
        }
    }
}

impl InputConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check(
            "buffer_frames",
            self.buffer_frames as f64,
            1.0,
            f64::from(MAX_BUFFER_FRAMES),
        )
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            buffer_frames: default_buffer_frames(),
            rate: default_rate(),
            channels: default_channels(),
        }
    }
}

fn default_path() -> PathBuf { "scope.mp4".into() }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_buffer_frames() -> usize { 1024 }
fn default_rate() -> u32 { 44_100 }
fn default_channels() -> u16 { 1 }

/// Explicit path first, then `./onsetscope.toml`, the XDG-style
/// `~/.config/onsetscope/config.toml`, then the platform config dir.
pub fn discover_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("onsetscope.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("onsetscope").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("onsetscope").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.emitter.validate()?;
    config.scope.validate()?;
    config.input.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::features::FeatureKind;
    use crate::element::Granularity;
    use crate::render::colormap::Colormap;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.emitter.bins, 100);
        assert_eq!(config.emitter.window_size, 200);
        assert_eq!(config.scope.power_max, 8_000.0);
        assert_eq!(config.input.buffer_frames, 1024);
        assert_eq!(config.output.format, EventFormat::Text);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [emitter]
            feature = "entropy"
            bins = 256
            threshold_low = 2.0
            granularity = "buffer"

            [scope]
            width = 640
            colormap = "gold"
            plain = true

            [output]
            format = "json"
            bitrate = "5M"

            [input]
            rate = 16000
            channels = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.emitter.feature, FeatureKind::Entropy);
        assert_eq!(config.emitter.bins, 256);
        assert_eq!(config.emitter.thresholds(), (2.0, 15.0));
        assert_eq!(config.emitter.granularity, Granularity::Buffer);
        assert_eq!(config.scope.width, 640);
        assert_eq!(config.scope.height, 240);
        assert_eq!(config.scope.colormap, Colormap::Gold);
        assert!(config.scope.plain);
        assert_eq!(config.output.format, EventFormat::Json);
        assert_eq!(config.output.encoder_options().bitrate.as_deref(), Some("5M"));
        assert_eq!((config.input.rate, config.input.channels), (16_000, 2));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = parse_config("[emitter]\nwindow_size = 5000\n").unwrap_err();
        assert!(err.to_string().contains("window_size"));
        assert!(parse_config("[scope]\nheight = 1\n").is_err());
    }

    #[test]
    fn empty_buffers_are_rejected() {
        let err = parse_config("[input]\nbuffer_frames = 0\n").unwrap_err();
        assert!(err.to_string().contains("buffer_frames"));
        assert!(parse_config("[input]\nbuffer_frames = 1\n").is_ok());
        assert!(parse_config("[input]\nbuffer_frames = 2000000\n").is_err());
    }

    #[test]
    fn unknown_enum_values_fail_to_parse() {
        assert!(parse_config("[scope]\ncolormap = \"rainbow\"\n").is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/tmp/custom.toml");
        assert_eq!(discover_config(Some(explicit.clone())), Some(explicit));
    }
}
