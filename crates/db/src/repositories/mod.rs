//! Repository layer: one unit struct per table, associated async functions
//! taking a pool or executor.

pub mod expansion_repo;
pub mod lock_repo;
pub mod room_repo;
pub mod tile_repo;
pub mod user_repo;
pub mod vote_repo;

pub use expansion_repo::ExpansionRepo;
pub use lock_repo::CellLockRepo;
pub use room_repo::RoomRepo;
pub use tile_repo::TileRepo;
pub use user_repo::UserRepo;
pub use vote_repo::VoteRepo;
