//! Raw input events and the activity source seam
//!
//! The guard does not listen to a UI toolkit directly. Hosts publish raw
//! input events on an [`ActivitySource`]; the runtime subscribes only
//! while activity tracking is enabled and drops the receiver otherwise.

use tokio::sync::broadcast;

/// Raw input event published by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// Pointer moved
    PointerMove,
    /// Pointer button pressed
    PointerDown,
    /// Key pressed
    KeyDown,
    /// Touch point moved
    TouchMove,
    /// Touch started
    TouchStart,
    /// Viewport scrolled
    Scroll,
    /// Viewport resized
    Resize,
}

/// Events that count as user activity
pub const TRACKED_EVENTS: [InputEvent; 5] = [
    InputEvent::PointerMove,
    InputEvent::PointerDown,
    InputEvent::KeyDown,
    InputEvent::TouchMove,
    InputEvent::TouchStart,
];

impl InputEvent {
    /// Whether this event resets the inactivity timer
    pub fn is_activity(self) -> bool {
        TRACKED_EVENTS.contains(&self)
    }
}

/// Subscribable stream of raw input events
pub trait ActivitySource: Send + Sync {
    /// Subscribe to input events; dropping the receiver unsubscribes
    fn subscribe(&self) -> broadcast::Receiver<InputEvent>;
}

/// Broadcast-backed activity source
#[derive(Debug, Clone)]
pub struct ActivityBus {
    event_tx: broadcast::Sender<InputEvent>,
}

impl ActivityBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self { event_tx }
    }

    /// Publish an input event, returning how many subscribers saw it
    pub fn emit(&self, event: InputEvent) -> usize {
        self.event_tx.send(event).unwrap_or(0)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySource for ActivityBus {
    fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_events() {
        for event in TRACKED_EVENTS {
            assert!(event.is_activity());
        }
        assert!(!InputEvent::Scroll.is_activity());
        assert!(!InputEvent::Resize.is_activity());
    }

    #[tokio::test]
    async fn test_bus_delivery() {
        let bus = ActivityBus::new();
        assert_eq!(bus.emit(InputEvent::KeyDown), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.emit(InputEvent::TouchStart), 1);
        assert_eq!(rx.recv().await.unwrap(), InputEvent::TouchStart);

        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
