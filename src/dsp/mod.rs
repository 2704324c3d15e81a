//! Streaming feature-extraction and event-detection engine.

pub mod event;
pub mod features;
pub mod fft;
pub mod ring;
pub mod threshold;

use crate::audio::pcm::PcmBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorUpdate<T> {
    None,
    Snapshot(T),
}

impl<T> From<ProcessorUpdate<T>> for Option<T> {
    fn from(update: ProcessorUpdate<T>) -> Self {
        match update {
            ProcessorUpdate::Snapshot(s) => Some(s),
            ProcessorUpdate::None => None,
        }
    }
}

/// An element driven synchronously by its host: one call per delivered
/// buffer, strictly in arrival order, never re-entered.
pub trait AudioProcessor {
    type Output;

    fn process_block(&mut self, block: &PcmBuffer<'_>) -> ProcessorUpdate<Self::Output>;

    /// Drop all streaming state (thresholds, event state, history) while
    /// keeping the allocated transform.
    fn reset(&mut self);
}
