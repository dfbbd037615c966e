use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{PipelineError, Result};

/// Pan and volume for one track, shared between the render thread and
/// whoever adjusts the mix. Stored as f32 bits so neither side locks.
#[derive(Debug)]
pub struct TrackControls {
    volume: AtomicU32,
    pan: AtomicU32,
}

impl TrackControls {
    pub fn new(volume: f32, pan: f32) -> Self {
        Self {
            volume: AtomicU32::new(volume.max(0.0).to_bits()),
            pan: AtomicU32::new(pan.clamp(-1.0, 1.0).to_bits()),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn pan(&self) -> f32 {
        f32::from_bits(self.pan.load(Ordering::Relaxed))
    }

    /// -1.0 is hard left, 1.0 hard right.
    pub fn set_pan(&self, pan: f32) {
        self.pan.store(pan.clamp(-1.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// (left, right) gains. A centred track plays at full volume on both sides.
    pub fn gains(&self) -> (f32, f32) {
        let volume = self.volume();
        let pan = self.pan();
        (volume * (1.0 - pan).min(1.0), volume * (1.0 + pan).min(1.0))
    }
}

enum TrackData {
    Pcm(Box<[f32]>),
    Silent,
}

/// A looping mono sample buffer with its own playback cursor.
pub struct Track {
    name: String,
    data: TrackData,
    cursor: usize,
    controls: Arc<TrackControls>,
}

impl Track {
    pub fn from_pcm(name: impl Into<String>, samples: Vec<f32>) -> Result<Self> {
        let name = name.into();
        if samples.is_empty() {
            return Err(PipelineError::EmptyTrack(name));
        }
        log::debug!("Track '{}': {} frames", name, samples.len());
        Ok(Self {
            name,
            data: TrackData::Pcm(samples.into_boxed_slice()),
            cursor: 0,
            controls: Arc::new(TrackControls::new(1.0, 0.0)),
        })
    }

    /// Stand-in for a track whose asset failed to load. Plays zeros forever.
    pub fn silent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: TrackData::Silent,
            cursor: 0,
            controls: Arc::new(TrackControls::new(1.0, 0.0)),
        }
    }

    pub fn with_pan(self, pan: f32) -> Self {
        self.controls.set_pan(pan);
        self
    }

    pub fn with_volume(self, volume: f32) -> Self {
        self.controls.set_volume(volume);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in frames; zero for a silent track.
    pub fn len(&self) -> usize {
        match &self.data {
            TrackData::Pcm(samples) => samples.len(),
            TrackData::Silent => 0,
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self.data, TrackData::Silent)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn controls(&self) -> &Arc<TrackControls> {
        &self.controls
    }

    #[cfg(test)]
    pub(crate) fn seek(&mut self, frame: usize) {
        let len = self.len().max(1);
        self.cursor = frame % len;
    }

    /// Fill `dst` from the cursor, wrapping to the start of the buffer as
    /// many times as needed, and leave the cursor just past the last sample read.
    pub fn read_into(&mut self, dst: &mut [f32]) {
        let samples = match &self.data {
            TrackData::Pcm(samples) => samples,
            TrackData::Silent => {
                dst.fill(0.0);
                return;
            }
        };

        let len = samples.len();
        let mut written = 0;
        while written < dst.len() {
            let run = (len - self.cursor).min(dst.len() - written);
            dst[written..written + run].copy_from_slice(&samples[self.cursor..self.cursor + run]);
            written += run;
            self.cursor += run;
            if self.cursor >= len {
                self.cursor = 0;
            }
        }
    }
}
