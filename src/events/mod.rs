//! Event system for viewer notifications
//!
//! A process-wide event bus that fans viewer and stream events out to
//! loggers, dashboards and other subscribers.

pub mod types;

pub use types::ViewerEvent;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for broadcasting viewer events
///
/// # Example
///
/// ```no_run
/// use camview::events::{EventBus, ViewerEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ViewerEvent::ViewerUnmounted {
///     camera_id: "cam1".to_string(),
/// });
/// ```
pub struct EventBus {
    tx: broadcast::Sender<ViewerEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// Events published without subscribers are dropped.
    pub fn publish(&self, event: ViewerEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// A subscriber that falls more than the channel capacity behind
    /// receives a `Lagged` error and misses events.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.tx.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
