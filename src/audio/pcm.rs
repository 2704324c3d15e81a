use crate::error::SetupError;

/// Negotiated stream format. Samples are always interleaved signed 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const MIN_RATE: u32 = 8_000;
    pub const MAX_RATE: u32 = 96_000;

    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if !(1..=2).contains(&self.channels) {
            return Err(SetupError::UnsupportedChannels(self.channels));
        }
        if !(Self::MIN_RATE..=Self::MAX_RATE).contains(&self.sample_rate) {
            return Err(SetupError::UnsupportedSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

/// Borrowed view over one buffer delivered by the host.
#[derive(Debug, Clone, Copy)]
pub struct PcmBuffer<'a> {
    pub samples: &'a [i16],
    pub format: PcmFormat,
    /// Position of the first frame in the stream, in frames.
    pub offset: u64,
}

impl<'a> PcmBuffer<'a> {
    pub fn new(samples: &'a [i16], format: PcmFormat, offset: u64) -> Self {
        Self {
            samples,
            format,
            offset,
        }
    }

    /// Stream time of the first frame, in seconds.
    pub fn time(&self) -> f64 {
        self.offset as f64 / f64::from(self.format.sample_rate.max(1))
    }

    /// Downmix into `out` (cleared first) by integer-averaging the samples of
    /// each frame. A dangling partial frame is dropped.
    pub fn downmix_into(&self, out: &mut Vec<i16>) {
        out.clear();
        let channels = usize::from(self.format.channels.max(1));
        if channels == 1 {
            out.extend_from_slice(self.samples);
            return;
        }

        out.reserve(self.samples.len() / channels);
        for frame in self.samples.chunks_exact(channels) {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            out.push((sum / channels as i32) as i16);
        }
    }
}

/// Back-to-back analysis windows of exactly `len` samples. Trailing samples
/// that do not fill a whole window are discarded.
pub fn analysis_windows(mono: &[i16], len: usize) -> std::slice::ChunksExact<'_, i16> {
    mono.chunks_exact(len.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_downmix_averages_each_frame() {
        let samples = [100i16, 300, -50, -150, i16::MAX, i16::MAX, 7];
        let buffer = PcmBuffer::new(&samples, PcmFormat::new(44_100, 2), 0);
        let mut mono = Vec::new();
        buffer.downmix_into(&mut mono);
        assert_eq!(mono, vec![200, -100, i16::MAX]);
    }

    #[test]
    fn mono_passes_through() {
        let samples = [1i16, 2, 3];
        let buffer = PcmBuffer::new(&samples, PcmFormat::new(8_000, 1), 0);
        let mut mono = vec![9, 9, 9, 9];
        buffer.downmix_into(&mut mono);
        assert_eq!(mono, vec![1, 2, 3]);
    }

    #[test]
    fn windows_drop_the_tail() {
        let mono = vec![0i16; 450];
        let windows: Vec<_> = analysis_windows(&mono, 200).collect();
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.len() == 200));
        assert_eq!(analysis_windows(&mono[..199], 200).count(), 0);
        assert_eq!(analysis_windows(&mono[..200], 200).count(), 1);
    }

    #[test]
    fn format_bounds() {
        assert!(PcmFormat::new(44_100, 2).validate().is_ok());
        assert!(PcmFormat::new(8_000, 1).validate().is_ok());
        assert!(matches!(
            PcmFormat::new(44_100, 6).validate(),
            Err(SetupError::UnsupportedChannels(6))
        ));
        assert!(matches!(
            PcmFormat::new(192_000, 2).validate(),
            Err(SetupError::UnsupportedSampleRate(192_000))
        ));
    }

    #[test]
    fn buffer_time_uses_frame_offset() {
        let buffer = PcmBuffer::new(&[], PcmFormat::new(48_000, 2), 24_000);
        assert!((buffer.time() - 0.5).abs() < 1e-12);
    }
}
