use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::track::Track;
use crate::config::TrackConfig;

/// Decoded mono PCM ready to become a [`Track`].
pub struct PcmSource {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the file before downmixing.
    pub source_channels: usize,
}

pub fn decode_audio(path: &Path) -> Result<PcmSource> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        downmix_into(&mut mono, sample_buf.samples(), channels);
    }

    log::info!(
        "Decoded {}: {} frames, {}Hz, {} channel(s), {:.1}s",
        path.display(),
        mono.len(),
        sample_rate,
        channels,
        mono.len() as f32 / sample_rate as f32
    );

    Ok(PcmSource {
        samples: mono,
        sample_rate,
        source_channels: channels,
    })
}

/// Average interleaved frames down to one channel.
fn downmix_into(mono: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        mono.extend_from_slice(interleaved);
    } else {
        mono.extend(
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }
}

/// Decode a configured track. On failure the caller still gets a silent
/// track in its slot, alongside the error that caused it.
pub fn load_track(config: &TrackConfig, session_rate: u32) -> (Track, Option<anyhow::Error>) {
    let name = config.display_name();
    let loaded = decode_audio(&config.path).and_then(|pcm| {
        if pcm.sample_rate != session_rate {
            log::warn!(
                "Track '{}' is {}Hz but the session runs at {}Hz; it will play at the wrong speed",
                name,
                pcm.sample_rate,
                session_rate
            );
        }
        Track::from_pcm(name.clone(), pcm.samples).map_err(anyhow::Error::from)
    });

    match loaded {
        Ok(track) => (track.with_pan(config.pan).with_volume(config.volume), None),
        Err(err) => {
            log::warn!("Track '{}' failed to load, playing silence: {:#}", name, err);
            let track = Track::silent(name).with_pan(config.pan).with_volume(config.volume);
            (track, Some(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[i16]) {
        let data_len = (frames.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in frames {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn write_aiff(path: &Path, sample_rate: u32, channels: u16, frames: &[i16]) {
        let data_len = (frames.len() * 2) as u32;
        let frame_count = frames.len() as u32 / channels as u32;

        // 80-bit IEEE extended sample rate
        let exponent = 31 - sample_rate.leading_zeros();
        let mantissa = (sample_rate as u64) << (63 - exponent);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"FORM");
        bytes.extend_from_slice(&(4 + 26 + 16 + data_len).to_be_bytes());
        bytes.extend_from_slice(b"AIFFCOMM");
        bytes.extend_from_slice(&18u32.to_be_bytes());
        bytes.extend_from_slice(&channels.to_be_bytes());
        bytes.extend_from_slice(&frame_count.to_be_bytes());
        bytes.extend_from_slice(&16u16.to_be_bytes());
        bytes.extend_from_slice(&((16383 + exponent) as u16).to_be_bytes());
        bytes.extend_from_slice(&mantissa.to_be_bytes());
        bytes.extend_from_slice(b"SSND");
        bytes.extend_from_slice(&(8 + data_len).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        for s in frames {
            bytes.extend_from_slice(&s.to_be_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sinegraph-{}-{}", std::process::id(), name))
    }

    #[test]
    fn downmixes_by_averaging() {
        let mut mono = Vec::new();
        downmix_into(&mut mono, &[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
        downmix_into(&mut mono, &[0.25], 1);
        assert_eq!(mono, vec![0.5, 0.5, 0.25]);
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let path = temp_path("stereo.wav");
        let frames: Vec<i16> = (0..64).flat_map(|_| [16384i16, 0]).collect();
        write_wav(&path, 22050, 2, &frames);

        let pcm = decode_audio(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(pcm.sample_rate, 22050);
        assert_eq!(pcm.source_channels, 2);
        assert_eq!(pcm.samples.len(), 64);
        assert!(pcm.samples.iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn decodes_mono_aiff() {
        let path = temp_path("guitar.aif");
        write_aiff(&path, 44100, 1, &[-16384, 16384, 0, 8192, -8192, 0, 16384, -16384]);

        let pcm = decode_audio(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(pcm.sample_rate, 44100);
        assert_eq!(pcm.source_channels, 1);
        assert_eq!(pcm.samples.len(), 8);
        assert!((pcm.samples[0] + 0.5).abs() < 1e-3);
        assert!((pcm.samples[1] - 0.5).abs() < 1e-3);
        assert!((pcm.samples[3] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn aiff_track_loads_with_config() {
        let path = temp_path("drums.aif");
        write_aiff(&path, 44100, 1, &[1000; 32]);
        let (track, err) = load_track(&TrackConfig::from_path(path.clone()), 44100);
        std::fs::remove_file(&path).ok();

        assert!(err.is_none());
        assert!(!track.is_silent());
        assert_eq!(track.len(), 32);
    }

    #[test]
    fn missing_file_falls_back_to_silence() {
        let config = TrackConfig {
            path: temp_path("does-not-exist.wav"),
            name: Some("ghost".into()),
            pan: -1.0,
            volume: 0.5,
        };
        let (track, err) = load_track(&config, 44100);
        assert!(err.is_some());
        assert!(track.is_silent());
        assert_eq!(track.name(), "ghost");
        assert_eq!(track.controls().gains(), (0.5, 0.0));
    }
}
