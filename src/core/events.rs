//! Observation events published to the view layer

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Structural change in the package catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    Added { name: String, component_id: String },
    Removed { name: String, component_id: String },
}

/// Client-wide notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The number of pending updates changed
    UpdatesAvailable { count: usize },
    /// The last in-flight backend task finished
    TasksFinished,
    /// The restart marker appeared
    RestartRequired,
    /// A driver scan matched `count` driver or firmware entries
    DriversDetected { count: usize },
}

/// Broadcast publisher; sending never fails when nobody listens
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: T) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
