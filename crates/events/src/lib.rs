//! Room change notifications.
//!
//! - [`ChangeNotifier`]: the seam the engine calls after every committed
//!   state change.
//! - [`EventBus`]: in-process fan-out backed by `tokio::sync::broadcast`.
//! - [`RoomEvent`]: the message carried on the bus.

pub mod bus;

pub use bus::{ChangeNotifier, EventBus, RoomEvent};
