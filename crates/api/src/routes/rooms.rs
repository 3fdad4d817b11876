//! Room routes, including the per-room lock, expansion and event endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{events, expansions, locks, rooms};
use crate::state::AppState;

/// Room routes mounted at `/rooms`.
///
/// ```text
/// GET    /                          -> list_rooms
/// POST   /                          -> create_room
/// GET    /{id}                      -> get_room
/// POST   /{id}/generate-initial     -> generate_initial
/// GET    /{id}/events               -> room_events
/// POST   /{id}/locks                -> acquire_lock
/// DELETE /{id}/locks                -> release_lock
/// POST   /{id}/expansions           -> create_expansion
/// POST   /{id}/resolve              -> resolve_room
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rooms::list_rooms).post(rooms::create_room))
        .route("/{id}", get(rooms::get_room))
        .route("/{id}/generate-initial", post(rooms::generate_initial))
        .route("/{id}/events", get(events::room_events))
        .route(
            "/{id}/locks",
            post(locks::acquire_lock).delete(locks::release_lock),
        )
        .route("/{id}/expansions", post(expansions::create_expansion))
        .route("/{id}/resolve", post(rooms::resolve_room))
}
