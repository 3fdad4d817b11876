//! Domain types and pure coordination rules for the collaborative tile grid.
//!
//! Nothing in this crate performs I/O. The repository layer (`jigsaw-db`) and
//! the API engine (`jigsaw-api`) apply the decisions computed here inside
//! database transactions.

pub mod error;
pub mod expansion;
pub mod grid;
pub mod lease;
pub mod resolution;
pub mod room;
pub mod types;
