pub mod expansions;
pub mod health;
pub mod rooms;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /users                                  register (public)
/// /session                                current user (auth)
///
/// /rooms                                  list (public), create (auth)
/// /rooms/{id}                             detail, runs the resolver (public)
/// /rooms/{id}/generate-initial            initial tile (owner)
/// /rooms/{id}/events                      SSE change stream (public)
/// /rooms/{id}/locks                       acquire (POST), release (DELETE)
/// /rooms/{id}/expansions                  create (auth)
/// /rooms/{id}/resolve                     settle stale candidates (auth)
///
/// /expansions/{id}/run                    run (creator or owner)
/// /expansions/{id}/adopt                  adopt (creator or owner)
/// /expansions/{id}/reject                 reject (creator or owner)
/// /expansions/{id}/votes                  vote (auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .nest("/rooms", rooms::router())
        .nest("/expansions", expansions::router())
}
