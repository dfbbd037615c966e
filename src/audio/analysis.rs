use std::sync::Arc;
use std::time::Duration;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{PipelineError, Result};
use crate::spectrum::bus::FrameBus;

/// Smallest block the real-FFT split can handle (two complex points).
pub const MIN_BLOCK_SIZE: usize = 4;

/// Windowed real FFT over a fixed block size.
///
/// All buffers are sized in [`SpectrumAnalyzer::new`]; [`analyze`](Self::analyze)
/// only reads and writes them, so it is safe to call from the render thread.
pub struct SpectrumAnalyzer {
    block_size: usize,
    sample_rate: u32,
    window: Vec<f32>,
    windowed: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    /// Even samples in `re`, odd samples in `im`; transformed in place.
    packed: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// exp(-2πik/N) for the even/odd recombination.
    twiddles: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

/// Reject block sizes the real-FFT split cannot handle.
pub fn check_block_size(block_size: usize) -> Result<()> {
    if !block_size.is_power_of_two() {
        return Err(PipelineError::NotPowerOfTwo(block_size));
    }
    if block_size < MIN_BLOCK_SIZE {
        return Err(PipelineError::BlockTooSmall {
            min: MIN_BLOCK_SIZE,
            actual: block_size,
        });
    }
    Ok(())
}

impl SpectrumAnalyzer {
    pub fn new(block_size: usize, sample_rate: u32) -> Result<Self> {
        check_block_size(block_size)?;

        let half = block_size / 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(half);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let twiddles = (0..half)
            .map(|k| {
                let angle = -2.0 * std::f32::consts::PI * k as f32 / block_size as f32;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();

        log::debug!(
            "Spectrum analyzer: {} samples @ {}Hz -> {} bins ({:.1}Hz each)",
            block_size,
            sample_rate,
            half,
            sample_rate as f32 / block_size as f32
        );

        Ok(Self {
            block_size,
            sample_rate,
            window: hann_window(block_size),
            windowed: vec![0.0; block_size],
            fft,
            packed: vec![Complex::new(0.0, 0.0); half],
            scratch,
            twiddles,
            magnitudes: vec![0.0; half],
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn bin_count(&self) -> usize {
        self.block_size / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Center frequency of bin `k` in Hz.
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.block_size as f32
    }

    /// Window, transform and take scaled magnitudes of one block.
    pub fn analyze(&mut self, block: &[f32]) -> Result<&[f32]> {
        if block.len() != self.block_size {
            return Err(PipelineError::BlockSizeMismatch {
                expected: self.block_size,
                actual: block.len(),
            });
        }

        for ((out, &sample), &w) in self.windowed.iter_mut().zip(block).zip(&self.window) {
            *out = sample * w;
        }

        for (slot, pair) in self.packed.iter_mut().zip(self.windowed.chunks_exact(2)) {
            *slot = Complex::new(pair[0], pair[1]);
        }

        self.fft.process_with_scratch(&mut self.packed, &mut self.scratch);

        let half = self.packed.len();
        let scale = 2.0 / self.block_size as f32;
        for k in 0..half {
            let z = self.packed[k];
            let mirror = self.packed[(half - k) % half].conj();
            let even = (z + mirror) * 0.5;
            let odd = (z - mirror) * Complex::new(0.0, -0.5);
            let bin = even + self.twiddles[k] * odd;
            self.magnitudes[k] = bin.norm() * scale;
        }

        Ok(&self.magnitudes)
    }
}

/// Collects analysis-track samples from the render callback into whole
/// analyzer blocks and publishes each finished spectrum to the bus.
pub struct AnalysisTap {
    analyzer: SpectrumAnalyzer,
    bus: Arc<FrameBus>,
    staging: Vec<f32>,
    filled: usize,
    samples_seen: u64,
    block_start: u64,
}

impl AnalysisTap {
    pub fn new(analyzer: SpectrumAnalyzer, bus: Arc<FrameBus>) -> Result<Self> {
        if bus.bin_count() != analyzer.bin_count() {
            return Err(PipelineError::BinCountMismatch {
                expected: bus.bin_count(),
                actual: analyzer.bin_count(),
            });
        }
        let staging = vec![0.0; analyzer.block_size()];
        Ok(Self {
            analyzer,
            bus,
            staging,
            filled: 0,
            samples_seen: 0,
            block_start: 0,
        })
    }

    pub fn push(&mut self, samples: &[f32]) {
        let block_size = self.staging.len();
        let mut rest = samples;
        while !rest.is_empty() {
            if self.filled == 0 {
                self.block_start = self.samples_seen;
            }
            let take = (block_size - self.filled).min(rest.len());
            self.staging[self.filled..self.filled + take].copy_from_slice(&rest[..take]);
            self.filled += take;
            self.samples_seen += take as u64;
            rest = &rest[take..];

            if self.filled == block_size {
                self.flush();
                self.filled = 0;
            }
        }
    }

    fn flush(&mut self) {
        let position =
            Duration::from_secs_f64(self.block_start as f64 / self.analyzer.sample_rate() as f64);
        // Sizes were matched in `new`; only a busy slot (`Ok(false)`) is expected.
        let published = self
            .analyzer
            .analyze(&self.staging)
            .and_then(|magnitudes| self.bus.publish(magnitudes, position));
        debug_assert!(published.is_ok(), "analysis block rejected: {:?}", published);
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
