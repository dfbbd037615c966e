use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::analysis::AnalysisTap;
use super::track::{Track, TrackControls};
use crate::error::{PipelineError, Result};

pub const OUTPUT_CHANNELS: usize = 2;

/// Sums looping tracks into a stereo output, one host callback at a time.
///
/// Everything the callback touches is owned here and sized at construction:
/// the tracks, a per-track read buffer, the planar scratch used for
/// interleaved output, and one optional analysis tap per track.
pub struct Mixer {
    tracks: Vec<Track>,
    taps: Vec<Option<AnalysisTap>>,
    read_buf: Vec<f32>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    playing: Arc<AtomicBool>,
}

/// Control surface for a mixer that has been moved into the audio callback.
#[derive(Clone)]
pub struct MixerHandle {
    controls: Arc<[Arc<TrackControls>]>,
    playing: Arc<AtomicBool>,
}

impl MixerHandle {
    pub fn play(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub fn pause(&self) {
        self.playing.store(false, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn track_count(&self) -> usize {
        self.controls.len()
    }

    pub fn set_volume(&self, track: usize, volume: f32) -> Result<()> {
        self.track(track)?.set_volume(volume);
        Ok(())
    }

    pub fn set_pan(&self, track: usize, pan: f32) -> Result<()> {
        self.track(track)?.set_pan(pan);
        Ok(())
    }

    fn track(&self, index: usize) -> Result<&TrackControls> {
        self.controls
            .get(index)
            .map(|controls| controls.as_ref())
            .ok_or(PipelineError::UnknownTrack(index))
    }
}

impl Mixer {
    /// `max_block_frames` bounds the internal chunk size, not the host
    /// request: longer requests are rendered in several chunks.
    ///
    /// `taps` pairs a track index with the tap that receives that track's raw
    /// samples. Each track takes at most one tap.
    pub fn new(
        tracks: Vec<Track>,
        max_block_frames: usize,
        taps: Vec<(usize, AnalysisTap)>,
    ) -> Result<Self> {
        if max_block_frames == 0 {
            return Err(PipelineError::InvalidSession("block size must be non-zero"));
        }

        let mut slots: Vec<Option<AnalysisTap>> = tracks.iter().map(|_| None).collect();
        for (index, tap) in taps {
            let slot = slots
                .get_mut(index)
                .ok_or(PipelineError::AnalysisTrackOutOfRange {
                    index,
                    tracks: tracks.len(),
                })?;
            if slot.is_some() {
                return Err(PipelineError::DuplicateAnalysisTrack(index));
            }
            *slot = Some(tap);
        }

        log::info!(
            "Mixer: {} tracks ({} analysed), blocks of up to {} frames",
            tracks.len(),
            slots.iter().filter(|tap| tap.is_some()).count(),
            max_block_frames
        );
        for track in tracks.iter().filter(|t| t.is_silent()) {
            log::warn!("Track '{}' will play silence", track.name());
        }

        Ok(Self {
            tracks,
            taps: slots,
            read_buf: vec![0.0; max_block_frames],
            left_buf: vec![0.0; max_block_frames],
            right_buf: vec![0.0; max_block_frames],
            playing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn handle(&self) -> MixerHandle {
        MixerHandle {
            controls: self.tracks.iter().map(|t| Arc::clone(t.controls())).collect(),
            playing: Arc::clone(&self.playing),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Render planar stereo. Both slices are overwritten.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<()> {
        if left.len() != right.len() {
            return Err(PipelineError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        left.fill(0.0);
        right.fill(0.0);
        if !self.playing.load(Ordering::Acquire) {
            return Ok(());
        }

        let chunk = self.read_buf.len();
        let mut start = 0;
        while start < left.len() {
            let end = (start + chunk).min(left.len());
            self.mix_chunk(&mut left[start..end], &mut right[start..end]);
            start = end;
        }
        Ok(())
    }

    /// Render interleaved stereo (`L R L R ...`).
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) -> Result<()> {
        if channels != OUTPUT_CHANNELS {
            return Err(PipelineError::UnsupportedChannelCount(channels));
        }
        if out.len() % channels != 0 {
            return Err(PipelineError::PartialFrame {
                len: out.len(),
                channels,
            });
        }

        out.fill(0.0);
        if !self.playing.load(Ordering::Acquire) {
            return Ok(());
        }

        let chunk = self.read_buf.len();
        for frames in out.chunks_mut(chunk * channels) {
            let n = frames.len() / channels;
            let mut left = std::mem::take(&mut self.left_buf);
            let mut right = std::mem::take(&mut self.right_buf);
            left[..n].fill(0.0);
            right[..n].fill(0.0);
            self.mix_chunk(&mut left[..n], &mut right[..n]);

            for (frame, (l, r)) in frames.chunks_exact_mut(channels).zip(left.iter().zip(&right)) {
                frame[0] = *l;
                frame[1] = *r;
            }
            self.left_buf = left;
            self.right_buf = right;
        }
        Ok(())
    }

    /// Accumulate every track into `left`/`right`, which must already be
    /// zeroed and no longer than the read buffer.
    fn mix_chunk(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len();
        let read = &mut self.read_buf[..n];
        for (track, tap) in self.tracks.iter_mut().zip(self.taps.iter_mut()) {
            track.read_into(read);
            if let Some(tap) = tap {
                tap.push(read);
            }

            let (left_gain, right_gain) = track.controls().gains();
            for ((l, r), &sample) in left.iter_mut().zip(right.iter_mut()).zip(read.iter()) {
                *l += sample * left_gain;
                *r += sample * right_gain;
            }
        }
    }
}
