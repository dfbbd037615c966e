use std::time::Duration;

/// One analysed block: scaled magnitudes for bins `0..N/2`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumFrame {
    magnitudes: Vec<f32>,
    sample_rate: u32,
    sequence: u64,
    position: Duration,
}

impl SpectrumFrame {
    pub fn new(magnitudes: Vec<f32>, sample_rate: u32, sequence: u64, position: Duration) -> Self {
        Self {
            magnitudes,
            sample_rate,
            sequence,
            position,
        }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Monotonic publish counter, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Stream time of the first sample in the analysed block.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Width of one bin in Hz (`sample_rate / N` with `N = 2 * bin_count`).
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / (2 * self.bin_count().max(1)) as f32
    }

    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.bin_width()
    }
}
