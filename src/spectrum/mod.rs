pub mod bus;
pub mod frame;
pub mod listeners;

use std::sync::Arc;

use bus::FrameBus;
use frame::SpectrumFrame;
use listeners::{ListenerId, ListenerRegistry, SpectrumListener};

/// Presentation-side end of the bus: pulls the newest frame and fans it out.
pub struct Presenter {
    bus: Arc<FrameBus>,
    listeners: Arc<ListenerRegistry>,
}

impl Presenter {
    pub fn new(bus: Arc<FrameBus>) -> Self {
        Self {
            bus,
            listeners: Arc::new(ListenerRegistry::new()),
        }
    }

    pub fn bus(&self) -> &Arc<FrameBus> {
        &self.bus
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub fn add_listener<L: SpectrumListener + 'static>(&self, listener: &Arc<L>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Deliver the newest frame, if one arrived since the last pump.
    pub fn pump(&self) -> Option<Arc<SpectrumFrame>> {
        let frame = self.bus.take_latest()?;
        self.listeners.deliver(&frame);
        Some(frame)
    }
}
