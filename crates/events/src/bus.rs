//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Delivery is at-most-once and limited to subscribers in the current
//! process. Nothing is persisted; a subscriber that lags past the channel
//! capacity loses events and must re-read the room. Clients are expected to
//! poll as a fallback.

use chrono::{DateTime, Utc};
use jigsaw_core::types::EntityId;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RoomEvent
// ---------------------------------------------------------------------------

/// "Something changed in this room." Carries no state; receivers re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomEvent {
    pub room_id: EntityId,

    /// Short machine-readable cause, e.g. `"lock.acquired"`.
    pub reason: &'static str,

    pub timestamp: DateTime<Utc>,
}

impl RoomEvent {
    pub fn new(room_id: EntityId, reason: &'static str) -> Self {
        Self {
            room_id,
            reason,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeNotifier
// ---------------------------------------------------------------------------

/// Fire-and-forget notification of a committed room change.
///
/// Implementations must not block and must not fail the caller.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, room_id: EntityId, reason: &'static str);
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Shared via `Arc<EventBus>` in the application state.
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped if there are none.
    pub fn publish(&self, event: RoomEvent) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events for every room.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier for EventBus {
    fn notify(&self, room_id: EntityId, reason: &'static str) {
        tracing::debug!(%room_id, reason, subscribers = self.subscriber_count(), "Room changed");
        self.publish(RoomEvent::new(room_id, reason));
    }
}
