//! Rooms: creation, listing, the read model, the initial tile and the
//! change stream.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get, post_auth, post_json, post_json_auth, FailingGenerator};
use http_body_util::BodyExt;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_room_requires_auth(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = post_json(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": "Anonymous" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn created_room_starts_pending_and_is_listed(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;

    let response = post_json_auth(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": " Harbor ", "style_preset": "watercolor" }),
        &owner.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let room = body_json(response).await["data"].clone();
    assert_eq!(room["name"], "Harbor");
    assert_eq!(room["initial_tile_status"], "PENDING");
    assert_eq!(room["owner_user_id"], owner.id.as_str());

    let response = get(test.app(), "/api/v1/rooms").await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(list["data"][0]["id"], room["id"]);
    assert_eq!(list["data"][0]["owner_display_name"], "Owner");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blank_room_name_is_rejected(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;

    let response = post_json_auth(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": "    " }),
        &owner.token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn initial_tile_lands_at_origin(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;
    let (room_id, tile_id) = common::room_with_origin(&test, &owner).await;

    let response = get(test.app(), &format!("/api/v1/rooms/{room_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await["data"].clone();

    assert_eq!(detail["initial_tile_status"], "DONE");
    let tiles = detail["tiles"].as_array().unwrap();
    assert_eq!(tiles.len(), 1);
    assert_eq!(tiles[0]["id"], tile_id.as_str());
    assert_eq!(tiles[0]["x"], 0);
    assert_eq!(tiles[0]["y"], 0);
    assert!(tiles[0]["image_url"].as_str().unwrap().starts_with("/generated/"));
    assert!(detail["expansions"].as_array().unwrap().is_empty());
    assert!(detail["locks"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn initial_tile_cannot_be_generated_twice(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;
    let (room_id, _) = common::room_with_origin(&test, &owner).await;

    let response = post_auth(
        test.app(),
        &format!("/api/v1/rooms/{room_id}/generate-initial"),
        &owner.token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_the_owner_generates_the_initial_tile(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;
    let guest = common::register(&test, "Guest").await;

    let response = post_json_auth(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": "Private" }),
        &owner.token,
    )
    .await;
    let room_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_auth(
        test.app(),
        &format!("/api/v1/rooms/{room_id}/generate-initial"),
        &guest.token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_initial_generation_can_be_retried(pool: PgPool) {
    let test = common::build_test_app_with(pool, |_| {}, Some(Arc::new(FailingGenerator)));
    let owner = common::register(&test, "Owner").await;

    let response = post_json_auth(
        test.app(),
        "/api/v1/rooms",
        serde_json::json!({ "name": "Unlucky" }),
        &owner.token,
    )
    .await;
    let room_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/v1/rooms/{room_id}/generate-initial");

    let response = post_auth(test.app(), &uri, &owner.token).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "Image generation failed");

    let detail = body_json(get(test.app(), &format!("/api/v1/rooms/{room_id}")).await).await;
    assert_eq!(detail["data"]["initial_tile_status"], "FAILED");
    assert!(detail["data"]["tiles"].as_array().unwrap().is_empty());

    // FAILED may start again; it fails again with the same backend.
    let response = post_auth(test.app(), &uri, &owner.token).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_room_is_404(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = get(
        test.app(),
        &format!("/api/v1/rooms/{}", uuid::Uuid::now_v7()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn event_stream_opens_with_ready(pool: PgPool) {
    let test = common::build_test_app(pool);
    let owner = common::register(&test, "Owner").await;
    let (room_id, _) = common::room_with_origin(&test, &owner).await;

    let response = get(test.app(), &format!("/api/v1/rooms/{room_id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: ready"), "unexpected first frame: {text}");
    assert!(text.contains(&room_id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn event_stream_for_missing_room_is_404(pool: PgPool) {
    let test = common::build_test_app(pool);

    let response = get(
        test.app(),
        &format!("/api/v1/rooms/{}/events", uuid::Uuid::now_v7()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
