//! Registration and bearer-token authentication.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, get_auth, post_json};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_returns_user_and_token(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = post_json(
        test.app(),
        "/api/v1/users",
        serde_json::json!({ "display_name": "  Ada  " }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["user"]["display_name"], "Ada");
    assert!(json["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_display_name_is_rejected(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = post_json(
        test.app(),
        "/api/v1/users",
        serde_json::json!({ "display_name": "   " }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn session_returns_the_token_owner(pool: PgPool) {
    let test = common::build_test_app(pool);
    let user = common::register(&test, "Grace").await;

    let response = get_auth(test.app(), "/api/v1/session", &user.token).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], user.id.as_str());
    assert_eq!(json["data"]["display_name"], "Grace");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn session_without_token_is_401(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = get(test.app(), "/api/v1/session").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing Authorization header");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn garbage_token_is_401(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = get_auth(test.app(), "/api/v1/session", "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid or expired token");
}
