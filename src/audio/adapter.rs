use std::collections::VecDeque;

/// Holds interleaved samples between source buffers so that each video frame
/// can look at a fixed-size run starting at its own position in the stream.
#[derive(Debug, Clone)]
pub struct SampleAdapter {
    channels: usize,
    samples: VecDeque<i16>,
    flushed: u64,
}

impl SampleAdapter {
    pub fn new(channels: u16) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            samples: VecDeque::new(),
            flushed: 0,
        }
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.samples.extend(samples);
    }

    /// Whole frames buffered.
    pub fn available(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Frames dropped so far, i.e. the stream position of the first buffered
    /// frame.
    pub fn position(&self) -> u64 {
        self.flushed
    }

    /// Up to `frames` frames from the front, without consuming them.
    pub fn peek(&mut self, frames: usize) -> &[i16] {
        let len = (frames * self.channels).min(self.samples.len());
        &self.samples.make_contiguous()[..len]
    }

    /// Drop up to `frames` frames from the front. Returns how many went.
    pub fn flush(&mut self, frames: usize) -> usize {
        let frames = frames.min(self.available());
        self.samples.drain(..frames * self.channels);
        self.flushed += frames as u64;
        frames
    }
}

/// Frame `k` starts at `k * rate / fps`, so the per-frame advance alternates
/// when the rate is not a multiple of the frame rate.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    rate: u64,
    fps: u64,
    frame: u64,
}

impl FrameClock {
    pub fn new(rate: u32, fps: u32) -> Self {
        Self {
            rate: u64::from(rate),
            fps: u64::from(fps.max(1)),
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Stream position, in frames, where frame `k` starts.
    pub fn start_of(&self, k: u64) -> u64 {
        k * self.rate / self.fps
    }

    /// Move to the next video frame and return how many audio frames to
    /// drop.
    pub fn advance(&mut self) -> usize {
        let step = self.start_of(self.frame + 1) - self.start_of(self.frame);
        self.frame += 1;
        step as usize
    }

    /// Video frames needed to cover `audio_frames` of audio.
    pub fn frames_for(&self, audio_frames: u64) -> u64 {
        (audio_frames * self.fps).div_ceil(self.rate.max(1))
    }
}
