//! Registration and session lookup.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jigsaw_core::error::CoreError;
use jigsaw_core::room::validate_display_name;
use jigsaw_db::models::user::{CreateUser, User};
use jigsaw_db::repositories::UserRepo;
use serde::Serialize;
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub user: User,
    pub token: String,
}

/// POST /api/v1/users
///
/// Create a user from a display name and hand back an access token.
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    validate_display_name(&input.display_name)?;

    let user = UserRepo::create(&state.pool, &input.display_name).await?;
    let token = generate_access_token(user.id, &user.display_name, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Failed to issue token: {e}")))?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: RegisteredUser { user, token },
        }),
    ))
}

/// GET /api/v1/session
pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("User no longer exists".into()))?;
    Ok(Json(DataResponse { data: user }))
}
