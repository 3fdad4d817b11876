//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` request DTOs for the operations on that entity

pub mod expansion;
pub mod lock;
pub mod room;
pub mod tile;
pub mod user;
pub mod vote;
