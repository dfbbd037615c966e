use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::frame::SpectrumFrame;

/// Receives every spectrum frame delivered on the presentation thread.
pub trait SpectrumListener: Send + Sync {
    fn on_spectrum(&self, frame: &SpectrumFrame);
}

/// Handle returned by [`ListenerRegistry::add`], used to remove the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Id-keyed table of listeners that the registry does not keep alive.
///
/// Callers own their listeners and remove them explicitly. An entry whose
/// listener was dropped without being removed is skipped on delivery and
/// cleared by [`prune`](Self::prune).
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Mutex<Vec<(ListenerId, Weak<dyn SpectrumListener>)>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: SpectrumListener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn SpectrumListener> = listener.clone();
        self.entries().push((id, Arc::downgrade(&listener)));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries();
        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop entries whose listener no longer exists. Returns how many went.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(_, listener)| listener.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every live listener with `frame`. The table is not locked while
    /// listeners run, so they may add or remove entries (including their own).
    pub fn deliver(&self, frame: &SpectrumFrame) -> usize {
        let live: Vec<Arc<dyn SpectrumListener>> = self
            .entries()
            .iter()
            .filter_map(|(_, listener)| listener.upgrade())
            .collect();

        for listener in &live {
            listener.on_spectrum(frame);
        }
        live.len()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(ListenerId, Weak<dyn SpectrumListener>)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
