/// All entity ids are UUID v7 values, opaque to clients.
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered entity id.
pub fn new_id() -> EntityId {
    uuid::Uuid::now_v7()
}
