use axum::routing::{get, post};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// User routes mounted at the API root.
///
/// ```text
/// POST /users     -> create_user
/// GET  /session   -> get_session
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::create_user))
        .route("/session", get(users::get_session))
}
