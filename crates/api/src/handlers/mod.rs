//! Request handlers.
//!
//! Handlers extract and validate input, delegate to [`crate::engine`], and
//! wrap results in the `{ "data": ... }` envelope.

pub mod events;
pub mod expansions;
pub mod locks;
pub mod rooms;
pub mod users;
