use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use super::frame::SpectrumFrame;
use crate::error::{PipelineError, Result};

struct Slot {
    magnitudes: Vec<f32>,
    position: Duration,
    sequence: u64,
    fresh: bool,
}

/// Counters describing how frames moved across the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Frames written into the slot.
    pub published: u64,
    /// Frames the producer gave up on because the consumer held the slot.
    pub dropped: u64,
    /// Frames overwritten before anyone took them.
    pub superseded: u64,
}

/// Single-slot hand-off of the newest spectrum from the render thread to
/// the presentation thread.
///
/// The producer only ever `try_lock`s the slot and copies into storage that
/// was sized up front, so publishing never blocks or allocates. The consumer
/// copies the slot out into a shared frame. A frame that nobody took before
/// the next publish is simply overwritten.
pub struct FrameBus {
    slot: Mutex<Slot>,
    bin_count: usize,
    sample_rate: u32,
    dropped: AtomicU64,
    superseded: AtomicU64,
}

impl FrameBus {
    pub fn new(bin_count: usize, sample_rate: u32) -> Self {
        Self {
            slot: Mutex::new(Slot {
                magnitudes: vec![0.0; bin_count],
                position: Duration::ZERO,
                sequence: 0,
                fresh: false,
            }),
            bin_count,
            sample_rate,
            dropped: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Producer side. `Ok(false)` means the slot was busy and this frame was
    /// dropped; the next one will take its place.
    pub fn publish(&self, magnitudes: &[f32], position: Duration) -> Result<bool> {
        if magnitudes.len() != self.bin_count {
            return Err(PipelineError::BinCountMismatch {
                expected: self.bin_count,
                actual: magnitudes.len(),
            });
        }

        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        };

        if slot.fresh {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        slot.magnitudes.copy_from_slice(magnitudes);
        slot.position = position;
        slot.sequence += 1;
        slot.fresh = true;
        Ok(true)
    }

    /// Consumer side. Returns the newest frame not yet taken, if any.
    pub fn take_latest(&self) -> Option<Arc<SpectrumFrame>> {
        let mut slot = self.lock_slot();
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        Some(Arc::new(SpectrumFrame::new(
            slot.magnitudes.clone(),
            self.sample_rate,
            slot.sequence,
            slot.position,
        )))
    }

    pub fn stats(&self) -> BusStats {
        let published = self.lock_slot().sequence;
        BusStats {
            published,
            dropped: self.dropped.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bus_yields_nothing() {
        let bus = FrameBus::new(4, 44100);
        assert!(bus.take_latest().is_none());
    }

    #[test]
    fn newer_frame_supersedes_unconsumed_one() {
        let bus = FrameBus::new(2, 44100);
        assert!(bus.publish(&[1.0, 1.0], Duration::ZERO).unwrap());
        assert!(bus.publish(&[2.0, 2.0], Duration::from_millis(10)).unwrap());

        let frame = bus.take_latest().unwrap();
        assert_eq!(frame.magnitudes(), &[2.0, 2.0]);
        assert_eq!(frame.sequence(), 2);
        assert_eq!(frame.position(), Duration::from_millis(10));
        assert!(bus.take_latest().is_none());

        let stats = bus.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.superseded, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn producer_drops_instead_of_blocking() {
        let bus = FrameBus::new(2, 44100);
        let guard = bus.slot.lock().unwrap();
        assert!(!bus.publish(&[1.0, 1.0], Duration::ZERO).unwrap());
        drop(guard);
        assert_eq!(bus.stats().dropped, 1);
        assert!(bus.take_latest().is_none());
    }

    #[test]
    fn rejects_wrong_bin_count() {
        let bus = FrameBus::new(4, 44100);
        assert_eq!(
            bus.publish(&[0.0; 3], Duration::ZERO),
            Err(PipelineError::BinCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn hands_frames_across_threads() {
        let bus = Arc::new(FrameBus::new(8, 44100));
        let producer = {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                for i in 0..100 {
                    let _ = bus.publish(&[i as f32; 8], Duration::ZERO);
                }
            })
        };
        let mut last = 0;
        while !producer.is_finished() {
            if let Some(frame) = bus.take_latest() {
                assert!(frame.sequence() > last);
                last = frame.sequence();
            }
        }
        producer.join().unwrap();
        if let Some(frame) = bus.take_latest() {
            assert!(frame.sequence() > last);
        }
    }
}
