use std::sync::Arc;

use clap::ValueEnum;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use serde::Deserialize;

use crate::error::SetupError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    Rectangular,
    #[default]
    Hamming,
    Hann,
    Bartlett,
    Blackman,
}

impl WindowFunction {
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        let tau = std::f32::consts::TAU;
        match self {
            WindowFunction::Rectangular => vec![1.0; len],
            WindowFunction::Hamming => (0..len)
                .map(|n| 0.53836 - 0.46164 * (tau * n as f32 / len as f32).cos())
                .collect(),
            WindowFunction::Hann => (0..len)
                .map(|n| 0.5 - 0.5 * (tau * n as f32 / len as f32).cos())
                .collect(),
            WindowFunction::Bartlett => {
                let span = (len.max(2) - 1) as f32;
                (0..len)
                    .map(|n| 1.0 - ((2.0 * n as f32 - span) / span).abs())
                    .collect()
            }
            WindowFunction::Blackman => (0..len)
                .map(|n| {
                    let phase = tau * n as f32 / len as f32;
                    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
                })
                .collect(),
        }
    }
}

/// Smallest even length >= `n` whose only prime factors are 2, 3 and 5.
pub fn next_fast_len(n: usize) -> usize {
    let mut len = n.max(2);
    loop {
        if len % 2 == 0 && is_smooth(len) {
            return len;
        }
        len += 1;
    }
}

fn is_smooth(mut n: usize) -> bool {
    for p in [2, 3, 5] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// Fixed-length windowed real FFT. Bins are scaled by `1/len`, which keeps
/// magnitudes in the same units as the 16-bit input samples.
pub struct SpectrumAnalyzer {
    len: usize,
    window: WindowFunction,
    coefficients: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyzer {
    pub fn new(len: usize, window: WindowFunction) -> Result<Self, SetupError> {
        let fft = plan(len)?;
        Ok(Self {
            len,
            window,
            coefficients: window.coefficients(len),
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn window(&self) -> WindowFunction {
        self.window
    }

    /// Replace the transform and every working buffer. Previous buffers are
    /// released as the new ones are installed.
    pub fn reconfigure(&mut self, len: usize, window: WindowFunction) -> Result<(), SetupError> {
        if len == self.len && window == self.window {
            return Ok(());
        }
        *self = Self::new(len, window)?;
        Ok(())
    }

    /// Window `chunk` into the scratch copy and transform it. The input slice
    /// is never modified.
    pub fn process(&mut self, chunk: &[i16]) -> &[Complex32] {
        assert_eq!(
            chunk.len(),
            self.len,
            "analysis window length does not match the planned transform"
        );

        for ((dst, &sample), &coef) in self.input.iter_mut().zip(chunk).zip(&self.coefficients) {
            *dst = f32::from(sample) * coef;
        }

        if let Err(err) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            unreachable!("real FFT rejected buffers planned for its own length: {err}");
        }

        let norm = 1.0 / self.len as f32;
        for bin in &mut self.spectrum {
            *bin *= norm;
        }
        &self.spectrum
    }
}

fn plan(len: usize) -> Result<Arc<dyn RealToComplex<f32>>, SetupError> {
    if len == 0 || len % 2 != 0 {
        return Err(SetupError::InvalidTransformLength(len));
    }
    Ok(RealFftPlanner::<f32>::new().plan_fft_forward(len))
}
