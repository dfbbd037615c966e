use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::plot::mapper::{PlotSettings, Viewport};
use crate::plot::visualizer::VisualizerShape;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
    #[serde(default)]
    pub visualizers: Vec<VisualizerConfig>,
}

/// Audio session parameters. Set up before the pipeline is built and left
/// untouched until it has been torn down.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frames per host callback (about 5ms at 44.1kHz).
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: usize,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnalyzerConfig {
    /// Power of two. Defaults to the next power of two above `buffer_frames`.
    #[serde(default)]
    pub fft_size: Option<usize>,
    /// Tracks to analyse, by index. Empty means every track.
    #[serde(default)]
    pub tracks: Vec<usize>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub settings: PlotSettings,
    #[serde(default)]
    pub viewport: Viewport,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pan: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VisualizerConfig {
    /// Index of the track whose spectrum this layer follows.
    #[serde(default)]
    pub track: usize,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f64,
    #[serde(default = "default_max_frequency")]
    pub max_frequency: f64,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub shape: VisualizerShape,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_frames: default_buffer_frames(),
        }
    }
}

impl TrackConfig {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            path,
            name: None,
            pan: 0.0,
            volume: default_volume(),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

impl VisualizerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Layered stack used when the config names none: full band, mirrored,
/// each layer trailing the previous by 4ms.
pub fn default_visualizers() -> Vec<VisualizerConfig> {
    (0..8)
        .map(|i| VisualizerConfig {
            track: 0,
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
            delay_ms: i * 4,
            shape: VisualizerShape::TopBottom,
        })
        .collect()
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_frames() -> usize { 220 }
fn default_volume() -> f32 { 1.0 }
fn default_min_frequency() -> f64 { 20.0 }
fn default_max_frequency() -> f64 { 20000.0 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}
