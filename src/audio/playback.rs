//! Host clock backed by the default output device.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::mixer::{Mixer, OUTPUT_CHANNELS};

/// A running output stream. Dropping it stops the device callback, which
/// also drops the mixer it owns.
pub struct OutputStream {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl OutputStream {
    pub fn start(mut mixer: Mixer, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No audio output device found")?;

        let supported = device
            .default_output_config()
            .context("Failed to get default output config")?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!("Output device wants {:?} samples, only f32 is supported", supported.sample_format());
        }

        let mut config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;
        if channels != OUTPUT_CHANNELS {
            anyhow::bail!("Output device has {} channels, only stereo is supported", channels);
        }
        config.sample_rate = cpal::SampleRate(sample_rate);

        log::info!(
            "Audio: {} @ {}Hz, {} channels",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if mixer.render_interleaved(data, channels).is_err() {
                        data.fill(0.0);
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .context("Failed to build audio stream")?;

        stream.play().context("Failed to start audio stream")?;

        Ok(Self {
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
