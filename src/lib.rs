//! Real-time looping track mixer feeding a windowed FFT and a layered
//! spectrum plot.
//!
//! The render thread owns a [`audio::mixer::Mixer`]; every finished
//! analysis block crosses to the presentation side through a single-slot
//! [`spectrum::bus::FrameBus`], where a [`spectrum::Presenter`] hands it to
//! listeners such as [`plot::visualizer::Visualizer`].

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod spectrum;

pub use error::{PipelineError, Result};
