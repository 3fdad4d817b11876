//! HTTP error mapping.
//!
//! Every failure leaves the API as `{ "error": <message>, "code": <CODE> }`.
//! Internal details are logged and replaced with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jigsaw_core::error::CoreError;
use jigsaw_db::repositories::{lock_repo, tile_repo};
use serde_json::json;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failures outside the domain, e.g. token signing or a lost task.
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

type ErrorParts = (StatusCode, &'static str, String);

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

fn core_parts(err: &CoreError) -> ErrorParts {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        // Provider detail is logged where the call failed; clients get the summary.
        CoreError::Provider(msg) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Message for a unique violation that escaped the engine's own checks.
fn unique_violation_message(constraint: &str) -> String {
    match constraint {
        tile_repo::UNIQUE_CELL_CONSTRAINT => "Cell already has a tile".to_string(),
        lock_repo::UNIQUE_CELL_CONSTRAINT => "Cell is already locked".to_string(),
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}

/// `RowNotFound` is 404 and `uq_*` unique violations are 409. Anything else
/// is a sanitized 500.
fn sqlx_parts(err: &sqlx::Error) -> ErrorParts {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }
    if let sqlx::Error::Database(db_err) = err {
        let constraint = db_err.constraint().filter(|c| c.starts_with("uq_"));
        if let (Some("23505"), Some(constraint)) = (db_err.code().as_deref(), constraint) {
            return (
                StatusCode::CONFLICT,
                "CONFLICT",
                unique_violation_message(constraint),
            );
        }
    }
    tracing::error!(error = %err, "Database error");
    internal()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(err) => core_parts(err),
            AppError::Database(err) => sqlx_parts(err),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}
