use thiserror::Error;

/// Faults raised while an element is being set up. There is no degraded mode:
/// any of these aborts setup and the element stays unusable until the next
/// successful `setup`.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("transform length must be a positive even number, got {0}")]
    InvalidTransformLength(usize),

    #[error("unsupported channel count {0} (expected mono or stereo)")]
    UnsupportedChannels(u16),

    #[error("unsupported sample rate {0} Hz (expected 8000-96000)")]
    UnsupportedSampleRate(u32),

    #[error("video dimensions must be at least 1x2, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("similarity template is empty")]
    EmptyTemplate,
}

/// Out-of-range settings caught by the configuration layer before they can
/// reach an element.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl ConfigError {
    pub fn check(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), Self> {
        if value.is_finite() && value >= min && value <= max {
            Ok(())
        } else {
            Err(Self::OutOfRange {
                name,
                value,
                min,
                max,
            })
        }
    }
}
