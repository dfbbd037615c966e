use std::sync::Arc;

use crate::audio::analysis::{check_block_size, AnalysisTap, SpectrumAnalyzer, MIN_BLOCK_SIZE};
use crate::audio::mixer::{Mixer, MixerHandle};
use crate::audio::track::Track;
use crate::config::{AnalyzerConfig, SessionConfig};
use crate::error::{PipelineError, Result};
use crate::spectrum::bus::FrameBus;
use crate::spectrum::Presenter;

/// FFT size used when none is configured: the smallest power of two that
/// holds one host buffer.
pub fn default_fft_size(buffer_frames: usize) -> usize {
    buffer_frames.max(MIN_BLOCK_SIZE).next_power_of_two()
}

pub fn validate_session(session: &SessionConfig) -> Result<()> {
    if session.sample_rate == 0 {
        return Err(PipelineError::InvalidSession("sample rate must be non-zero"));
    }
    if session.buffer_frames == 0 {
        return Err(PipelineError::InvalidSession("buffer size must be non-zero"));
    }
    Ok(())
}

/// A freshly wired pipeline, split by the thread each part belongs to.
///
/// `mixer` goes to the audio callback; `handle` and `presenters` stay with
/// the presentation side. `presenters` is indexed by track and holds a
/// presenter for every analysed track. Stop the host clock before dropping
/// any of them.
pub struct Pipeline {
    pub mixer: Mixer,
    pub handle: MixerHandle,
    pub presenters: Vec<Option<Presenter>>,
}

impl Pipeline {
    /// Every track is analysed unless `analyzer.tracks` names a subset.
    pub fn new(session: &SessionConfig, analyzer: &AnalyzerConfig, tracks: Vec<Track>) -> Result<Self> {
        validate_session(session)?;

        let fft_size = analyzer
            .fft_size
            .unwrap_or_else(|| default_fft_size(session.buffer_frames));
        check_block_size(fft_size)?;

        let analysed: Vec<usize> = if analyzer.tracks.is_empty() {
            (0..tracks.len()).collect()
        } else {
            analyzer.tracks.clone()
        };

        let mut presenters: Vec<Option<Presenter>> = tracks.iter().map(|_| None).collect();
        let mut taps = Vec::with_capacity(analysed.len());
        for &index in &analysed {
            let spectrum = SpectrumAnalyzer::new(fft_size, session.sample_rate)?;
            let bus = Arc::new(FrameBus::new(spectrum.bin_count(), session.sample_rate));
            taps.push((index, AnalysisTap::new(spectrum, Arc::clone(&bus))?));
            if let Some(slot) = presenters.get_mut(index) {
                *slot = Some(Presenter::new(bus));
            }
        }

        // Range and duplicate checks on the analysed indices happen here.
        let mixer = Mixer::new(tracks, session.buffer_frames, taps)?;
        let handle = mixer.handle();

        log::info!(
            "Pipeline ready: {}Hz, {}-frame buffers, {}-point FFT ({} bins) on tracks {:?}",
            session.sample_rate,
            session.buffer_frames,
            fft_size,
            fft_size / 2,
            analysed
        );

        Ok(Self {
            mixer,
            handle,
            presenters,
        })
    }

    /// Presenter for the spectra of `track`, if that track is analysed.
    pub fn presenter(&self, track: usize) -> Option<&Presenter> {
        self.presenters.get(track).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::mapper::{PlotMapper, PlotSettings, Viewport};
    use crate::plot::visualizer::{PathCommand, PlotPath, Visualizer, VisualizerShape};
    use std::time::Duration;

    fn session(buffer_frames: usize) -> SessionConfig {
        SessionConfig {
            sample_rate: 44100,
            buffer_frames,
        }
    }

    #[test]
    fn fft_size_rounds_up_to_power_of_two() {
        assert_eq!(default_fft_size(220), 256);
        assert_eq!(default_fft_size(1024), 1024);
        assert_eq!(default_fft_size(1), MIN_BLOCK_SIZE);
    }

    fn analyse(fft_size: usize, tracks: Vec<usize>) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: Some(fft_size),
            tracks,
        }
    }

    #[test]
    fn misconfiguration_fails_at_construction() {
        let track = || vec![Track::from_pcm("a", vec![0.0; 16]).unwrap()];
        assert_eq!(
            Pipeline::new(&session(256), &analyse(1000, Vec::new()), track()).err(),
            Some(PipelineError::NotPowerOfTwo(1000))
        );
        assert_eq!(
            Pipeline::new(&session(256), &analyse(1000, Vec::new()), Vec::new()).err(),
            Some(PipelineError::NotPowerOfTwo(1000))
        );
        assert!(matches!(
            Pipeline::new(&session(0), &AnalyzerConfig::default(), track()),
            Err(PipelineError::InvalidSession(_))
        ));
        assert!(matches!(
            Pipeline::new(&session(256), &analyse(256, vec![4]), track()),
            Err(PipelineError::AnalysisTrackOutOfRange { .. })
        ));
        assert_eq!(
            Pipeline::new(&session(256), &analyse(256, vec![0, 0]), track()).err(),
            Some(PipelineError::DuplicateAnalysisTrack(0))
        );
    }

    #[test]
    fn analyses_every_track_unless_told_otherwise() {
        let tracks = || {
            vec![
                Track::from_pcm("guitar", vec![0.0; 16]).unwrap(),
                Track::from_pcm("drums", vec![0.0; 16]).unwrap(),
            ]
        };
        let all = Pipeline::new(&session(256), &AnalyzerConfig::default(), tracks()).unwrap();
        assert!(all.presenter(0).is_some());
        assert!(all.presenter(1).is_some());
        assert!(all.presenter(2).is_none());

        let drums_only = Pipeline::new(&session(256), &analyse(256, vec![1]), tracks()).unwrap();
        assert!(drums_only.presenter(0).is_none());
        assert!(drums_only.presenter(1).is_some());
    }

    #[test]
    fn silence_flows_through_to_a_flat_plot() {
        let tracks = vec![Track::from_pcm("zeros", vec![0.0; 4096]).unwrap()];
        let Pipeline {
            mut mixer,
            handle,
            presenters,
        } = Pipeline::new(&session(256), &analyse(1024, Vec::new()), tracks).unwrap();
        let presenter = presenters[0].as_ref().expect("track 0 analysed");
        handle.play();

        let (mut left, mut right) = (vec![0.0f32; 256], vec![0.0f32; 256]);
        for _ in 0..4 {
            mixer.render(&mut left, &mut right).unwrap();
        }

        let frame = presenter.pump().expect("1024 samples rendered");
        assert_eq!(frame.bin_count(), 512);
        assert!(frame.magnitudes().iter().all(|&m| m == 0.0));

        let viewport = Viewport {
            width: 320.0,
            height: 100.0,
            min_y: 0.0,
            max_y: 1.0,
        };
        let series = PlotMapper::new(PlotSettings::default()).map(&frame, &viewport);
        assert!(!series.points.is_empty());
        assert!(series.points.iter().all(|p| p.y == 100.0));
    }

    #[test]
    fn layered_visualizers_follow_playback() {
        let tone: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 44100.0).sin())
            .collect();
        let tracks = vec![
            Track::from_pcm("tone", tone).unwrap(),
            Track::from_pcm("quiet", vec![0.0; 512]).unwrap(),
        ];
        let Pipeline {
            mut mixer,
            handle,
            presenters,
        } = Pipeline::new(&session(256), &analyse(256, Vec::new()), tracks).unwrap();
        let tone_presenter = presenters[0].as_ref().unwrap();
        let quiet_presenter = presenters[1].as_ref().unwrap();

        let settings = PlotSettings {
            scale_divisor: 1.0,
            ..PlotSettings::default()
        };
        let layer = |delay_ms| {
            Arc::new(
                Visualizer::new(
                    settings.clone(),
                    Viewport::default(),
                    VisualizerShape::TopOnly,
                    Duration::from_millis(delay_ms),
                )
                .unwrap(),
            )
        };
        let front = layer(0);
        let trailing = layer(20);
        let quiet = layer(0);
        tone_presenter.add_listener(&front);
        let trailing_id = tone_presenter.add_listener(&trailing);
        quiet_presenter.add_listener(&quiet);

        handle.play();
        let mut out = vec![0.0f32; 512];
        mixer.render_interleaved(&mut out, 2).unwrap();
        assert!(tone_presenter.pump().is_some());
        assert!(quiet_presenter.pump().is_some());

        let clock = Duration::from_secs_f64(256.0 / 44100.0);
        let raised = |path: &PlotPath| {
            path.commands.iter().any(|c| match c {
                PathCommand::CurveTo { to, .. } => to.y < 200.0,
                _ => false,
            })
        };
        let path = front.poll(clock).expect("no delay");
        assert!(raised(&path));
        assert!(!raised(&quiet.poll(clock).expect("no delay")));
        assert!(trailing.poll(clock).is_none());
        assert!(trailing.poll(Duration::from_millis(20)).is_some());

        assert!(tone_presenter.remove_listener(trailing_id));
        mixer.render_interleaved(&mut out, 2).unwrap();
        tone_presenter.pump();
        assert_eq!(trailing.staged(), 0);
        assert_eq!(front.staged(), 1);
    }
}
