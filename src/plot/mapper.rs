use serde::{Deserialize, Serialize};

use super::curve::{control_points, CurveSegment, Point};
use crate::error::{PipelineError, Result};
use crate::spectrum::frame::SpectrumFrame;

/// Lowest and highest frequency the plot's bin index is mapped onto.
pub const PLOT_MIN_HZ: f64 = 20.0;
pub const PLOT_MAX_HZ: f64 = 20000.0;

/// Empirical divisor that brings raw magnitudes into roughly `[0, 1]`.
pub const DEFAULT_SCALE_DIVISOR: f64 = 2_600_000.0;
pub const DEFAULT_GAMMA: f64 = 1.8;

/// Linear remap of `value` from `[from_min, from_max]` to `[to_min, to_max]`.
pub fn map_range(from_min: f64, from_max: f64, to_min: f64, to_max: f64, value: f64) -> f64 {
    let t = (value - from_min) / (from_max - from_min);
    t * (to_max - to_min) + to_min
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Viewport {
    /// A viewport points can be mapped onto: positive size and a non-empty,
    /// finite y-range.
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(PipelineError::InvalidViewport("width and height must be positive"));
        }
        let span = (self.max_y - self.min_y).abs();
        if !(span > 0.0 && span.is_finite()) {
            return Err(PipelineError::InvalidViewport("min_y and max_y must differ"));
        }
        Ok(())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 375.0,
            height: 200.0,
            min_y: 0.0,
            max_y: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotSettings {
    pub scale_divisor: f64,
    pub gamma: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    /// Zeros added on each side of the band before plotting.
    pub padding: usize,
    /// Neighbours on each side averaged into every value.
    pub smoothing: usize,
    /// Emit Bézier control points instead of straight segments.
    pub smooth: bool,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            scale_divisor: DEFAULT_SCALE_DIVISOR,
            gamma: DEFAULT_GAMMA,
            min_frequency: PLOT_MIN_HZ,
            max_frequency: PLOT_MAX_HZ,
            padding: 1,
            smoothing: 0,
            smooth: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlotSeries {
    pub points: Vec<Point>,
    /// One entry per segment when smoothing was requested.
    pub controls: Option<Vec<CurveSegment>>,
}

/// Turns spectrum frames into plot points for a viewport.
#[derive(Clone, Debug, Default)]
pub struct PlotMapper {
    settings: PlotSettings,
}

impl PlotMapper {
    pub fn new(settings: PlotSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PlotSettings {
        &self.settings
    }

    pub fn scaled(&self, frame: &SpectrumFrame) -> Vec<f64> {
        frame
            .magnitudes()
            .iter()
            .map(|&m| m as f64 / self.settings.scale_divisor)
            .collect()
    }

    /// Lifts quiet bins and flattens peaks. Non-positive values pass through.
    pub fn compress(&self, value: f64) -> f64 {
        if value > 0.0 {
            (value * 1.5) / (value * 2.0).powf(1.0 / self.settings.gamma)
        } else {
            value
        }
    }

    /// Frequency a bin index stands for on the plot's linear 20Hz..20kHz axis.
    pub fn plot_frequency(index: usize, count: usize) -> f64 {
        map_range(0.0, count as f64, PLOT_MIN_HZ, PLOT_MAX_HZ, index as f64)
    }

    pub fn band_filter(&self, values: &[f64]) -> Vec<f64> {
        let (min, max) = (self.settings.min_frequency, self.settings.max_frequency);
        values
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                let freq = Self::plot_frequency(*i, values.len());
                freq >= min && freq <= max
            })
            .map(|(_, &v)| v)
            .collect()
    }

    pub fn pad(&self, values: Vec<f64>) -> Vec<f64> {
        let padding = self.settings.padding;
        if padding == 0 {
            return values;
        }
        let mut padded = Vec::with_capacity(values.len() + 2 * padding);
        padded.resize(padding, 0.0);
        padded.extend(values);
        padded.resize(padded.len() + padding, 0.0);
        padded
    }

    /// Scale, compress, band-filter and pad one frame.
    pub fn spectrum_values(&self, frame: &SpectrumFrame) -> Vec<f64> {
        let compressed: Vec<f64> = self
            .scaled(frame)
            .into_iter()
            .map(|v| self.compress(v))
            .collect();
        self.pad(self.band_filter(&compressed))
    }

    pub fn smooth_neighbors(&self, values: &[f64]) -> Vec<f64> {
        let reach = self.settings.smoothing;
        if reach == 0 {
            return values.to_vec();
        }
        (0..values.len())
            .map(|i| {
                let start = i.saturating_sub(reach);
                let end = (i + reach + 1).min(values.len());
                values[start..end].iter().sum::<f64>() / (end - start) as f64
            })
            .collect()
    }

    /// Spread values evenly across the width and map them onto the
    /// viewport's y-range, top edge = `max_y`. The viewport must pass
    /// [`Viewport::validate`].
    pub fn to_points(&self, values: &[f64], viewport: &Viewport) -> Vec<Point> {
        let denominator = if values.len() > 1 { values.len() - 1 } else { values.len() } as f64;
        let (low, high) = (
            viewport.min_y.min(viewport.max_y),
            viewport.min_y.max(viewport.max_y),
        );
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let x = i as f64 / denominator * viewport.width;
                let y = map_range(viewport.max_y, viewport.min_y, 0.0, viewport.height, v.clamp(low, high));
                Point::new(x, y)
            })
            .collect()
    }

    /// Smooth, place and (optionally) fit curves to already-prepared values.
    pub fn series(&self, values: &[f64], viewport: &Viewport) -> PlotSeries {
        let points = self.to_points(&self.smooth_neighbors(values), viewport);
        let controls = self.settings.smooth.then(|| control_points(&points));
        PlotSeries { points, controls }
    }

    pub fn map(&self, frame: &SpectrumFrame, viewport: &Viewport) -> PlotSeries {
        self.series(&self.spectrum_values(frame), viewport)
    }
}
